//! Domain model (IDs, envelopes, task state, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod state;

pub use self::envelope::{Envelope, EnvelopeKind, Stream};
pub use self::errors::{BridgeError, EnvelopeError, ErrorCode, TaskError};
pub use self::ids::{CorrelationId, InvocationId, TaskId};
pub use self::state::TaskState;
