use uuid::Uuid;

/// Source of globally unique ids for workflows, stages and activities.
///
/// Implementations must not need coordination between processes.
pub trait IdGenerator: Send + Sync {
    fn generate_id(&self) -> String;
}

/// Time-ordered UUIDv7 ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn generate_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}
