use std::collections::HashMap;

use crate::error::{Error, TokenizerResult};

/// Maps colors to the small integer ids stored in the token metadata.
///
/// Id 0 is reserved and means "not set". Colors are normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMap {
    is_frozen: bool,
    last_color_id: u32,
    id_to_color: Vec<String>,
    color_to_id: HashMap<String, u32>,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self {
            is_frozen: false,
            last_color_id: 0,
            // id 0 has no color
            id_to_color: vec![String::new()],
            color_to_id: HashMap::new(),
        }
    }
}

impl ColorMap {
    /// A color map that will assign new ids as colors are requested
    pub fn new() -> Self {
        Self::default()
    }

    /// A color map with fixed ids: the position of each color is its id.
    /// Asking a frozen map for a color it doesn't have is an error.
    pub fn frozen(colors: &[String]) -> Self {
        let mut color_to_id = HashMap::with_capacity(colors.len());
        for (id, color) in colors.iter().enumerate() {
            color_to_id.insert(color.to_uppercase(), id as u32);
        }

        Self {
            is_frozen: true,
            last_color_id: colors.len().saturating_sub(1) as u32,
            id_to_color: colors.to_vec(),
            color_to_id,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    /// Returns the id of the color, `0` for `None`.
    pub fn get_id(&mut self, color: Option<&str>) -> TokenizerResult<u32> {
        let Some(color) = color else {
            return Ok(0);
        };
        let color = color.to_uppercase();

        // id 0 is never a valid lookup result, even if a frozen map put a color there
        if let Some(&id) = self.color_to_id.get(&color)
            && id != 0
        {
            return Ok(id);
        }

        if self.is_frozen {
            return Err(Error::MissingColor(color));
        }

        self.last_color_id += 1;
        self.color_to_id.insert(color.clone(), self.last_color_id);
        self.id_to_color.push(color);
        Ok(self.last_color_id)
    }

    /// The color for each id, the first element being the unused id 0
    pub fn colors(&self) -> &[String] {
        &self.id_to_color
    }

    pub fn get_color(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.id_to_color.get(id as usize).map(|c| c.as_str())
    }
}
