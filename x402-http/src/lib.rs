//! HTTP transport glue for the x402 protocol.
//!
//! Two small pieces:
//!
//! - [`headers`] - the `X-PAYMENT` / `X-PAYMENT-RESPONSE` base64-JSON
//!   header codec used between clients and resource servers
//! - [`facilitator`] - [`FacilitatorClient`](facilitator::FacilitatorClient),
//!   a remote [`Facilitator`](x402::facilitator::Facilitator) speaking
//!   the `POST /verify`, `POST /settle`, `GET /supported` API

pub mod facilitator;
pub mod headers;
