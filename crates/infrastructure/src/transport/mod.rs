mod http;
mod signer;
mod wire;

pub use http::HttpQueryTransport;
pub use signer::HmacSigner;
pub use wire::{
    parse_multi, parse_service_list, parse_single, records_from_reply, QueryUrlBuilder,
    ServiceListReply, SingleHostReply,
};
