pub mod error;
pub mod module_type;
pub mod leading_pad;
pub mod block;
pub mod sink;
pub mod decoder;
pub mod source;

pub use error::{ErrorKind, ParseError};
pub use module_type::{ModuleId, ModuleType};
pub use block::{BlockHeader, write_block};
pub use sink::{BlockSink, CollectingSink, DumpingSink, DirectoryStore, HeaderEvent, NullSink};
pub use decoder::{BlockStreamDecoder, DecoderState, ParseSummary, Step};
pub use source::{ContainerSource, SourceError};
