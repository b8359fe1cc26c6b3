//! PSI program discovery (C6) and PID filter coordination (C7): parses
//! PAT/PMT/SDT off the live TS, maintains the program list, and drives the
//! hardware PID allow-list plus PAT synthesis through [`joker_proto::ControlBus`].

pub mod error;
pub mod filter;
pub mod pat;
pub mod pat_synth;
pub mod pmt;
pub mod program;
pub mod sdt;
pub mod section;

pub use error::Error;
pub use filter::{FilterCoordinator, FIXED_SERVICE_PIDS};
pub use pat::{Pat, PatEntry};
pub use pat_synth::synthesize_pat_packet;
pub use pmt::{ElementaryStream, Pmt};
pub use program::{CamState, Program, ProgramIndex};
pub use sdt::ServiceEntry;
pub use section::SectionReassembler;
