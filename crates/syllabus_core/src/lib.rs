pub mod domain;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod repository;
pub mod selection;
pub mod session;

pub use domain::{
    derive_title, Breakdown, Chapter, Collection, NewBreakdown, SyllabusSubmission, User,
    UNTITLED_SYLLABUS,
};
pub use error::{AuthError, GenerationError, LoadError, SelectionError, SessionError};
pub use pipeline::{GenerationPipeline, UploadNotice};
pub use ports::{IdentityService, PortError, PortResult, StructuringService, SyllabusStore};
pub use repository::{BreakdownRepository, LoadOutcome, LoadTicket, PendingLoad};
pub use selection::{Selection, SelectionController};
pub use session::{SessionEvent, SessionHandle, SessionUpdate, SyncSession};
