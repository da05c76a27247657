pub mod audit;
pub mod locks;
pub mod record_types;
pub mod registry;
pub mod serial;
pub mod validators;
pub mod zone_manager;
pub mod zone_parser;
pub mod zone_writer;

pub use record_types::{DnsRecordType, Record, RecordData, Soa, ZoneFile};
pub use registry::{RegistryZoneEntry, ZoneCategory, ZoneRegistry};
pub use zone_manager::{MutationOutcome, ZoneCreation, ZoneKind, ZoneManager, ZoneSummary};
