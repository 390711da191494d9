use serde::{Deserialize, Serialize};

/// Asset definition: `asset_id` is `name#domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    pub domain_id: String,
    pub precision: u8,
}
