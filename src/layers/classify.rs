use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::foundation::error::SeqResult;
use crate::layers::source::ChannelSource;

/// Logical grouping of channels that share a dotted prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layer {
    /// Layer key, i.e. every channel-name segment except the last.
    pub name: String,
    /// Full channel names belonging to this layer.
    pub channels: BTreeSet<String>,
    pub has_r: bool,
    pub has_g: bool,
    pub has_b: bool,
    pub has_a: bool,
}

impl Layer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn has_rgb(&self) -> bool {
        self.has_r && self.has_g && self.has_b
    }

    pub fn has_rgba(&self) -> bool {
        self.has_rgb() && self.has_a
    }

    /// A layer can be cached only when it carries a complete colour set.
    pub fn is_displayable(&self) -> bool {
        self.has_rgb() || self.has_rgba()
    }

    /// Channel-selection expression for the colour channels of this layer.
    pub fn rgb_selection(&self) -> String {
        rgb_selection(&self.name)
    }

    fn observe(&mut self, full_name: &str, component: &str) {
        self.channels.insert(full_name.to_string());
        match component {
            "R" => self.has_r = true,
            "G" => self.has_g = true,
            "B" => self.has_b = true,
            "A" => self.has_a = true,
            _ => {}
        }
    }
}

pub fn is_displayable(layer: &Layer) -> bool {
    layer.is_displayable()
}

pub(crate) fn rgb_selection(layer: &str) -> String {
    format!("{layer}.R,{layer}.G,{layer}.B")
}

/// Group dotted channel names into layers and keep the displayable ones.
///
/// Names without a `.` cannot belong to a layer and are ignored. Layers without a full RGB set
/// are dropped from the result entirely.
pub fn classify<I, S>(channel_names: I) -> BTreeMap<String, Layer>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups = BTreeMap::<String, Layer>::new();
    for name in channel_names {
        let name = name.as_ref();
        let Some((prefix, component)) = name.rsplit_once('.') else {
            continue;
        };
        groups
            .entry(prefix.to_string())
            .or_insert_with(|| Layer::new(prefix))
            .observe(name, component);
    }

    groups.retain(|_, layer| layer.is_displayable());
    groups
}

/// Open a container through `source` and classify its channels.
///
/// Read failures abort with no partial result.
#[tracing::instrument(skip(source), fields(path = %path.display()))]
pub fn analyze_container(
    source: &dyn ChannelSource,
    path: &Path,
) -> SeqResult<BTreeMap<String, Layer>> {
    let entries = source.read_channels(path)?;
    let layers = classify(entries.iter().map(|e| e.name.as_str()));
    tracing::debug!(
        channels = entries.len(),
        layers = layers.len(),
        "classified container"
    );
    Ok(layers)
}

#[cfg(test)]
#[path = "../../tests/unit/layers/classify.rs"]
mod tests;
