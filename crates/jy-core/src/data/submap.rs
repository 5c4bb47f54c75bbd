//! Submap (scene) records: header, layers and per-cell event table

use serde::{Deserialize, Serialize};

use crate::consts::{MAP_SIZE, SUBMAP_EVENTS, SUBMAP_LAYERS};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubMapRecord {
    pub id: i16,
    pub name: [u8; 10],
    pub exit_music: i16,
    pub enter_music: i16,
    pub jump_sub_map: i16,
    /// 0 = open, 1 = closed, 2 = needs a condition met by scripts
    pub enter_condition: i16,
    pub global_enter_x1: i16,
    pub global_enter_y1: i16,
    pub global_enter_x2: i16,
    pub global_enter_y2: i16,
    pub enter_x: i16,
    pub enter_y: i16,
    pub exit_x: [i16; 3],
    pub exit_y: [i16; 3],
    pub jump_x: i16,
    pub jump_y: i16,
    pub jump_return_x: i16,
    pub jump_return_y: i16,
}

crate::word_layout!(SubMapRecord {
    id: i16,
    name: [u8; 10],
    exit_music: i16,
    enter_music: i16,
    jump_sub_map: i16,
    enter_condition: i16,
    global_enter_x1: i16,
    global_enter_y1: i16,
    global_enter_x2: i16,
    global_enter_y2: i16,
    enter_x: i16,
    enter_y: i16,
    exit_x: [i16; 3],
    exit_y: [i16; 3],
    jump_x: i16,
    jump_y: i16,
    jump_return_x: i16,
    jump_return_y: i16,
});

/// One entry of a submap's event table.
///
/// `event` holds the script ids run on interact, on use-item and on step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubMapEvent {
    pub blocked: i16,
    pub index: i16,
    pub event: [i16; 3],
    pub curr_tex: i16,
    pub end_tex: i16,
    pub beg_tex: i16,
    pub tex_delay: i16,
    pub x: i16,
    pub y: i16,
}

crate::word_layout!(SubMapEvent {
    blocked: i16,
    index: i16,
    event: [i16; 3],
    curr_tex: i16,
    end_tex: i16,
    beg_tex: i16,
    tex_delay: i16,
    x: i16,
    y: i16,
});

/// Layer indices of a submap.
pub mod layer {
    pub const EARTH: usize = 0;
    pub const BUILDING: usize = 1;
    pub const DECORATION: usize = 2;
    /// Holds the index into the event table, -1 where there is none.
    pub const EVENT: usize = 3;
}

/// The six 64x64 layers of one submap, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMapLayers {
    data: Vec<i16>,
}

impl Default for SubMapLayers {
    fn default() -> Self {
        let mut data = vec![0; SUBMAP_LAYERS * MAP_SIZE * MAP_SIZE];
        let event_layer = layer::EVENT * MAP_SIZE * MAP_SIZE;
        data[event_layer..event_layer + MAP_SIZE * MAP_SIZE].fill(-1);
        Self { data }
    }
}

impl SubMapLayers {
    fn offset(layer: i32, x: i32, y: i32) -> Option<usize> {
        let size = MAP_SIZE as i32;
        if !(0..SUBMAP_LAYERS as i32).contains(&layer) || !(0..size).contains(&x) || !(0..size).contains(&y) {
            return None;
        }
        Some((layer * size * size + y * size + x) as usize)
    }

    pub fn get(&self, layer: i32, x: i32, y: i32) -> Option<i16> {
        Self::offset(layer, x, y).and_then(|i| self.data.get(i).copied())
    }

    pub fn set(&mut self, layer: i32, x: i32, y: i32, value: i16) -> bool {
        match Self::offset(layer, x, y).and_then(|i| self.data.get_mut(i)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Mutable row-major view of a whole layer.
    pub fn layer_mut(&mut self, layer: usize) -> Option<&mut [i16]> {
        let len = MAP_SIZE * MAP_SIZE;
        if layer >= SUBMAP_LAYERS {
            return None;
        }
        self.data.get_mut(layer * len..(layer + 1) * len)
    }
}

/// Default event table: every slot empty and unplaced.
pub fn empty_events() -> Vec<SubMapEvent> {
    vec![
        SubMapEvent {
            event: [-1; 3],
            curr_tex: -1,
            end_tex: -1,
            beg_tex: -1,
            ..Default::default()
        };
        SUBMAP_EVENTS
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fields::WordLayout;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(<SubMapRecord as WordLayout>::WORDS, 26);
        assert_eq!(<SubMapEvent as WordLayout>::WORDS, 11);
    }

    #[test]
    fn test_layers_bounds() {
        let mut layers = SubMapLayers::default();
        assert_eq!(layers.get(layer::EVENT as i32, 5, 5), Some(-1));
        assert!(layers.set(1, 63, 63, 9));
        assert_eq!(layers.get(1, 63, 63), Some(9));
        assert!(!layers.set(1, 64, 0, 9));
        assert!(!layers.set(6, 0, 0, 9));
        assert_eq!(layers.get(0, -1, 0), None);
    }

    #[test]
    fn test_event_word_index() {
        let mut ev = SubMapEvent::default();
        assert!(ev.write_word(5, 4664));
        assert_eq!(ev.curr_tex, 4664);
        assert!(ev.write_word(3, 12));
        assert_eq!(ev.event[1], 12);
    }
}
