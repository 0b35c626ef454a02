use mpd_protocol::response::Frame;

use crate::tag::Tag;

/// Response to the `list` command.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct List {
    /// The fields returned by the command, in the order returned by MPD.
    pub fields: Vec<(Tag, String)>,
}

impl List {
    pub(crate) fn from_frame(frame: Frame) -> Self {
        let fields = frame
            .into_fields()
            .into_iter()
            .map(|(tag, value)| (Tag::try_from(tag.as_str()).unwrap(), value))
            .collect();

        Self { fields }
    }

    /// Values of the first (and usually only) tag grouping in this response, e.g. the genre
    /// names returned by `list genre`.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
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
    fn collects_values() {
        let list = List::from_frame(frame("Genre: Rock\nGenre: Jazz\nOK\n"));
        assert_eq!(list.values().collect::<Vec<_>>(), vec!["Rock", "Jazz"]);
    }
}
