#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V0,
    V1,
}

impl SchemaVersion {
    /// Determines the dialect by scanning for a top-level `schema_version:` key, per the
    /// formatter's precondition.
    pub fn detect(text: &str) -> SchemaVersion {
        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("schema_version:") {
                let value = trimmed["schema_version:".len()..].trim();
                if value == "1" {
                    return SchemaVersion::V1;
                }
            }
        }
        SchemaVersion::V0
    }
}
