/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */

pub mod context;
pub mod errors;
pub mod multipart;
mod parsers;
pub mod properties;
pub mod request;
pub mod response;
pub mod signer;
pub mod transport;

pub use context::*;
pub use errors::*;
pub use multipart::*;
pub use properties::*;
pub use request::*;
pub use response::*;
pub use transport::*;
