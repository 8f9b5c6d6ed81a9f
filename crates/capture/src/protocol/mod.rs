//! Core protocol types of captured HTTP traffic.
//!
//! - **Message Handling** ([`message`]): items produced by the decoders
//!   - [`Message`]: either a header block or a payload item
//!   - [`PayloadItem`]: a payload chunk or the end-of-body marker
//!   - [`PayloadSize`]: how a body is framed
//!
//! - **Captured Messages**: [`RequestHeader`], [`Request`], [`ResponseHeader`],
//!   [`Response`] and the emitted [`Exchange`] pair
//!
//! - **Bodies** ([`Body`]): collected body bytes with cached binary detection
//!
//! - **Rendering** ([`DumpOptions`], [`hex_dump`]): display serialization
//!
//! - **Error Handling** ([`error`]):
//!   - [`ParseError`]: malformed HTTP framing
//!   - [`PipeError`]: closed pipe or expired read deadline
//!   - [`StreamError`]: either of the above, as seen by a stream worker
//!   - [`SetupError`]: capture session setup failures

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod body;
pub use body::Body;

mod dump;
pub use dump::DumpOptions;
pub use dump::hex_dump;

mod request;
pub(crate) use request::content_length;
pub use request::Request;
pub use request::RequestHeader;

mod response;
pub use response::Response;
pub use response::ResponseHeader;

mod exchange;
pub use exchange::Exchange;

mod error;
pub use error::ParseError;
pub use error::PipeError;
pub use error::SetupError;
pub use error::StreamError;
