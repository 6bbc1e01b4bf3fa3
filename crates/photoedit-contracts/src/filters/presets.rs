use super::channel::Channel;
use crate::errors::{EditorError, EditorResult};

/// A named partial override of the filter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    name: &'static str,
    overrides: &'static [(Channel, f64)],
}

impl Preset {
    pub const fn new(name: &'static str, overrides: &'static [(Channel, f64)]) -> Self {
        Self { name, overrides }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn overrides(&self) -> &'static [(Channel, f64)] {
        self.overrides
    }

    pub fn value(&self, channel: Channel) -> Option<f64> {
        self.overrides
            .iter()
            .find(|(candidate, _)| *candidate == channel)
            .map(|(_, value)| *value)
    }
}

pub const PRESETS: &[Preset] = &[
    Preset::new(
        "Normal",
        &[
            (Channel::Brightness, 100.0),
            (Channel::Contrast, 100.0),
            (Channel::Saturation, 100.0),
            (Channel::Grayscale, 0.0),
            (Channel::Sepia, 0.0),
            (Channel::Blur, 0.0),
            (Channel::HueRotate, 0.0),
        ],
    ),
    Preset::new(
        "Noir",
        &[
            (Channel::Grayscale, 100.0),
            (Channel::Contrast, 120.0),
            (Channel::Brightness, 90.0),
        ],
    ),
    Preset::new(
        "Warmth",
        &[
            (Channel::Sepia, 50.0),
            (Channel::Contrast, 110.0),
            (Channel::Saturation, 130.0),
        ],
    ),
    Preset::new(
        "Vintage",
        &[
            (Channel::Sepia, 30.0),
            (Channel::Brightness, 110.0),
            (Channel::Saturation, 80.0),
            (Channel::Contrast, 90.0),
        ],
    ),
    Preset::new(
        "Cyber",
        &[
            (Channel::Saturation, 180.0),
            (Channel::Contrast, 130.0),
            (Channel::HueRotate, 15.0),
        ],
    ),
];

pub fn find_preset(name: &str) -> EditorResult<&'static Preset> {
    let wanted = name.trim();
    PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| EditorError::UnknownPreset(wanted.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{find_preset, PRESETS};
    use crate::errors::EditorError;
    use crate::filters::{Channel, FilterVector};

    #[test]
    fn noir_on_identity_matches_expected_vector() -> anyhow::Result<()> {
        let noir = FilterVector::identity().with_preset(find_preset("Noir")?);
        let expected = FilterVector::identity()
            .with_channel(Channel::Grayscale, 100.0)?
            .with_channel(Channel::Contrast, 120.0)?
            .with_channel(Channel::Brightness, 90.0)?;
        assert_eq!(noir, expected);
        assert_eq!(noir.get(Channel::Saturation), 100.0);
        assert_eq!(noir.get(Channel::HueRotate), 0.0);
        Ok(())
    }

    #[test]
    fn applying_a_preset_is_idempotent() -> anyhow::Result<()> {
        let start = FilterVector::identity()
            .with_channel(Channel::Blur, 4.0)?
            .with_channel(Channel::HueRotate, 200.0)?;
        for preset in PRESETS {
            let once = start.with_preset(preset);
            assert_eq!(once.with_preset(preset), once, "{}", preset.name());
        }
        Ok(())
    }

    #[test]
    fn presets_only_touch_named_channels() -> anyhow::Result<()> {
        let start = FilterVector::identity().with_channel(Channel::Blur, 6.0)?;
        let warm = start.with_preset(find_preset("warmth")?);
        assert_eq!(warm.get(Channel::Blur), 6.0);
        assert_eq!(warm.get(Channel::Sepia), 50.0);
        Ok(())
    }

    #[test]
    fn normal_resets_everything() -> anyhow::Result<()> {
        let start = FilterVector::identity().with_preset(find_preset("cyber")?);
        assert!(start.with_preset(find_preset("normal")?).is_identity());
        Ok(())
    }

    #[test]
    fn preset_values_are_in_range() {
        for preset in PRESETS {
            for (channel, value) in preset.overrides() {
                assert!(channel.range().contains(*value), "{} {channel}", preset.name());
            }
        }
    }

    #[test]
    fn unknown_preset_is_reported() {
        assert_eq!(
            find_preset("Sunset"),
            Err(EditorError::UnknownPreset("Sunset".to_string()))
        );
    }
}
