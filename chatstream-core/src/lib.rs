pub mod chat;
pub mod config;
pub mod decode;
pub mod error;
pub mod model;
pub mod reducer;
pub mod response;
pub mod session;
pub mod stream;
pub mod telemetry;

pub use chat::{ChatState, SessionOutcome};
pub use config::Config;
pub use decode::{FramePrefixes, WireFormat};
pub use error::{ChatStreamError, CoreResult};
pub use model::{FunctionCall, FunctionCallSlot, Message, Role};
pub use session::{ChunkReader, Session, SessionOptions, SessionState, StopHandle, StreamReader};
pub use stream::{Event, SessionEvent, Snapshot};
