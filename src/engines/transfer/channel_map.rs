/// Old channel index for every new channel; `None` marks a padded slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap(Vec<Option<usize>>);

impl ChannelMap {
    pub fn identity(width: usize) -> Self {
        ChannelMap((0..width).map(Some).collect())
    }

    /// Leading channels line up, extra new channels are padded
    pub fn positional(new_width: usize, old_width: usize) -> Self {
        ChannelMap((0..new_width).map(|i| (i < old_width).then_some(i)).collect())
    }

    /// `kept` old channels in order, then padding up to `new_width`
    pub fn from_kept(kept: Vec<usize>, new_width: usize) -> Self {
        let mut map: Vec<Option<usize>> = kept.into_iter().take(new_width).map(Some).collect();
        map.resize(new_width, None);
        ChannelMap(map)
    }

    /// Maps of several inputs laid side by side, each shifted by the old
    /// offset of its input
    pub fn concat(parts: &[(ChannelMap, usize)]) -> Self {
        let mut map = Vec::new();
        let mut offset = 0;
        for (part, old_width) in parts {
            map.extend(part.0.iter().map(|c| c.map(|c| c + offset)));
            offset += old_width;
        }
        ChannelMap(map)
    }

    /// Map over a flattened `[.., c]` tensor. Leading axes line up
    /// positionally, the channel axis follows `channels`.
    pub fn flatten(channels: &ChannelMap, new_shape: &[usize], old_shape: &[usize]) -> Self {
        let new_len: usize = new_shape.iter().product();
        if new_shape.len() != old_shape.len() || new_shape.is_empty() {
            return ChannelMap::positional(new_len, old_shape.iter().product());
        }
        let map = (0..new_len)
            .map(|flat| {
                let mut rest = flat;
                let mut old_flat = 0;
                let mut stride = 1;
                for axis in (0..new_shape.len()).rev() {
                    let index = rest % new_shape[axis];
                    rest /= new_shape[axis];
                    let old_index = if axis + 1 == new_shape.len() {
                        channels.get(index)?
                    } else {
                        index
                    };
                    if old_index >= old_shape[axis] {
                        return None;
                    }
                    old_flat += old_index * stride;
                    stride *= old_shape[axis];
                }
                Some(old_flat)
            })
            .collect();
        ChannelMap(map)
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.0.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_identity(&self, old_width: usize) -> bool {
        self.0.len() == old_width && self.0.iter().enumerate().all(|(i, c)| *c == Some(i))
    }
}
