pub mod http;
pub mod icon;
pub mod observation;
pub mod query;
