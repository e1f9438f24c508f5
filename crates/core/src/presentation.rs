//! Fixed presentation data injected into every successful response.
//!
//! The shapes follow the Discord message schema: an embed is a rich
//! preview block, a component is an action row (`type: 1`) holding
//! buttons (`type: 2`). Values are static deployment data, never derived
//! from the request.

use serde::{Deserialize, Serialize};

/// Action row component type.
pub const ACTION_ROW: u8 = 1;
/// Button component type.
pub const BUTTON: u8 = 2;

const INDICATOR_SUMMARY: &str = concat!(
    "0\u{fe0f}\u{20e3}\u{2934}\u{fe0f} 24h +7.26%\n",
    "0\u{fe0f}\u{20e3}\u{2934}\u{fe0f} BB 20 2 = 87.04 \u{2190} 128.69 \u{2192} 170.34 \n",
    "0\u{fe0f}\u{20e3}\u{2934}\u{fe0f} MACD 12 26 close 9 = -3.39 -18.80 -15.40\n",
    "0\u{fe0f}\u{20e3}\u{2934}\u{fe0f} Stoch RSI 14 14 3 3  = K 23.23 D 16.577",
);

/// A rich-content preview block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub color: u32,
}

impl Default for EmbedDescriptor {
    fn default() -> Self {
        Self {
            kind: "rich".into(),
            title: "Solana".into(),
            description: INDICATOR_SUMMARY.into(),
            color: 0x8400ff,
        }
    }
}

/// One interactive button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonDescriptor {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: String,
    pub custom_id: String,
    pub disabled: bool,
}

impl Default for ButtonDescriptor {
    fn default() -> Self {
        Self {
            kind: BUTTON,
            style: 1,
            label: "SWAP".into(),
            custom_id: "row_0_button_0".into(),
            disabled: false,
        }
    }
}

/// One action row of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDescriptor {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<ButtonDescriptor>,
}

impl Default for ComponentDescriptor {
    fn default() -> Self {
        Self {
            kind: ACTION_ROW,
            components: vec![ButtonDescriptor::default()],
        }
    }
}

/// The embed and the component row written into `data` of every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub embed: EmbedDescriptor,

    #[serde(default)]
    pub component: ComponentDescriptor,
}

impl Presentation {
    /// The value for `data.embeds`.
    pub fn embeds(&self) -> Vec<&EmbedDescriptor> {
        vec![&self.embed]
    }

    /// The value for `data.components`.
    pub fn components(&self) -> Vec<&ComponentDescriptor> {
        vec![&self.component]
    }
}
