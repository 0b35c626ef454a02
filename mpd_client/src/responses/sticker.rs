use std::collections::HashMap;

use mpd_protocol::response::Frame;

use crate::responses::TypedResponseError;

/// Response to the `sticker get` command.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct StickerGet {
    /// The sticker value.
    pub value: String,
}

impl StickerGet {
    pub(crate) fn from_frame(frame: Frame) -> Result<Self, TypedResponseError> {
        let mut fields = frame.into_fields().into_iter();
        let Some((key, field_value)) = fields.next() else {
            return Err(TypedResponseError::missing("sticker"));
        };

        if key != "sticker" {
            return Err(TypedResponseError::unexpected_field("sticker", key));
        }

        let (_, sticker_value) = parse_sticker_value(field_value)?;

        Ok(StickerGet {
            value: sticker_value,
        })
    }
}

impl From<StickerGet> for String {
    fn from(sticker_get: StickerGet) -> Self {
        sticker_get.value
    }
}

/// Response to the `sticker list` command.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct StickerList {
    /// A map of sticker names to their values.
    pub value: HashMap<String, String>,
}

impl StickerList {
    pub(crate) fn from_frame(frame: Frame) -> Result<Self, TypedResponseError> {
        let value = frame
            .into_fields()
            .into_iter()
            .map(|(_, value)| parse_sticker_value(value))
            .collect::<Result<_, _>>()?;

        Ok(Self { value })
    }
}

impl From<StickerList> for HashMap<String, String> {
    fn from(sticker_list: StickerList) -> Self {
        sticker_list.value
    }
}

/// Response to the `sticker find` command.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct StickerFind {
    /// A map of songs (by file path) to their sticker values.
    pub value: HashMap<String, String>,
}

impl StickerFind {
    pub(crate) fn from_frame(frame: Frame) -> Result<Self, TypedResponseError> {
        let mut value = HashMap::new();
        let mut file = String::new();

        for (key, tag) in frame.into_fields() {
            match key.as_str() {
                "file" => file = tag,
                "sticker" => {
                    let (_, sticker_value) = parse_sticker_value(tag)?;
                    value.insert(file.clone(), sticker_value);
                }
                other => return Err(TypedResponseError::unexpected_field("sticker", other)),
            }
        }

        Ok(Self { value })
    }
}

/// Parses a `key=value` sticker payload into its key and value strings.
fn parse_sticker_value(mut tag: String) -> Result<(String, String), TypedResponseError> {
    match tag.split_once('=') {
        Some((key, value)) => {
            let value = String::from(value);
            tag.truncate(key.len());
            Ok((tag, value))
        }
        None => Err(TypedResponseError::invalid_value("sticker", tag)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        match mpd_protocol::Response::parse(text).unwrap() {
            mpd_protocol::Response::Success(f) => f,
            mpd_protocol::Response::Error(_) => unreachable!(),
        }
    }

    #[test]
    fn get_parses_single_value() {
        let get = StickerGet::from_frame(frame("sticker: rating=8\nOK\n")).unwrap();
        assert_eq!(get.value, "8");
    }

    #[test]
    fn find_maps_file_to_sticker() {
        let find = StickerFind::from_frame(frame(
            "file: a.flac\nsticker: rating=8\nfile: b.flac\nsticker: rating=2\nOK\n",
        ))
        .unwrap();

        assert_eq!(find.value.get("a.flac").map(String::as_str), Some("8"));
        assert_eq!(find.value.get("b.flac").map(String::as_str), Some("2"));
    }
}
