//! Wire-level types shared between the runtime and the transport binary:
//! the event envelope, the field-abbreviation/gzip codec, and the
//! time/size-bounded batcher. Nothing here depends on the runtime crate.

pub mod batch;
pub mod codec;
pub mod envelope;
pub mod event;
pub mod stats;

pub use batch::{Batcher, BATCH_MAX_SIZE};
pub use codec::{CodecError, Frame};
pub use envelope::{Envelope, CODEC_VERSION};
pub use event::is_critical;
pub use stats::CodecStats;
