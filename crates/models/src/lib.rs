mod triggers;

pub use triggers::{
    InvalidSpec, RemoteTrigger, Tag, TriggerId, TriggerSpec, TtlState, Weekday, DEFAULT_TTL,
};
