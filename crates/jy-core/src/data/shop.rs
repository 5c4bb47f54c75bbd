//! Shop records

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopRecord {
    pub item: [i16; 5],
    pub total: [i16; 5],
    pub price: [i16; 5],
}

crate::word_layout!(ShopRecord {
    item: [i16; 5],
    total: [i16; 5],
    price: [i16; 5],
});
