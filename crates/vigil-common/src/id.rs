use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static BUCKET: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Sets the machine and node components (0-31 each) used for generated ids.
/// Calling it again replaces the generator.
pub fn init(machine_id: i32, node_id: i32) {
    let mut bucket = BUCKET.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *bucket = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Returns a new snowflake id as a decimal string. Falls back to machine 1,
/// node 1 when [`init`] was never called.
pub fn next_id() -> String {
    let mut bucket = BUCKET.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    bucket
        .get_or_insert_with(|| SnowflakeIdBucket::new(1, 1))
        .get_id()
        .to_string()
}
