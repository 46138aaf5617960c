use crate::error::{Result, SessionError};

/// Channel selection sent to the Configurable data service.
///
/// After connecting, the service streams nothing useful until it is told
/// which channels every node should carry. Channel names are element names
/// from the service's channel list, e.g. `Lq` (local quaternion), `c`
/// (positional constraint), `Gq` (global quaternion), `a` (accelerometer).
///
/// ```text
/// <?xml version="1.0"?><configurable inactive="1"><Lq/><c/></configurable>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    channels: Vec<String>,
    inactive: bool,
}

impl ChannelRequest {
    /// Request `channels` for every active node.
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            inactive: false,
        }
    }

    /// Also stream skeleton nodes that are animated but have no sensor.
    pub fn with_inactive(mut self, inactive: bool) -> Self {
        self.inactive = inactive;
        self
    }

    /// Requested channel names, in request order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Whether inactive nodes are requested.
    pub fn inactive(&self) -> bool {
        self.inactive
    }

    /// Serialize the request as the XML message the service expects.
    pub fn to_xml(&self) -> Result<String> {
        if self.channels.is_empty() {
            return Err(SessionError::InvalidRequest(
                "at least one channel is required".to_string(),
            ));
        }

        let mut xml = String::from(r#"<?xml version="1.0"?><configurable"#);
        if self.inactive {
            xml.push_str(r#" inactive="1""#);
        }
        xml.push('>');
        for channel in &self.channels {
            validate_channel_name(channel)?;
            xml.push('<');
            xml.push_str(channel);
            xml.push_str("/>");
        }
        xml.push_str("</configurable>");

        Ok(xml)
    }
}

fn validate_channel_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidRequest(format!(
            "'{name}' is not a valid channel name"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::is_metadata;

    #[test]
    fn serializes_channel_list() {
        let xml = ChannelRequest::new(["Lq", "c"]).to_xml().unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0"?><configurable><Lq/><c/></configurable>"#
        );
        assert!(is_metadata(xml.as_bytes()));
    }

    #[test]
    fn inactive_flag_adds_attribute() {
        let request = ChannelRequest::new(["Lqw", "Lqx", "Lqy", "Lqz"]).with_inactive(true);
        assert!(request.inactive());
        assert_eq!(
            request.to_xml().unwrap(),
            r#"<?xml version="1.0"?><configurable inactive="1"><Lqw/><Lqx/><Lqy/><Lqz/></configurable>"#
        );
    }

    #[test]
    fn output_is_well_formed_xml() {
        let xml = ChannelRequest::new(["Gq", "a", "m_2"])
            .with_inactive(true)
            .to_xml()
            .unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let names: Vec<_> = doc
            .root_element()
            .children()
            .map(|n| n.tag_name().name().to_string())
            .collect();
        assert_eq!(names, vec!["Gq", "a", "m_2"]);
    }

    #[test]
    fn rejects_empty_request() {
        let err = ChannelRequest::new(Vec::<String>::new())
            .to_xml()
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_names_that_would_break_xml() {
        for bad in ["", "1a", "a b", "x/>", "<y", "q\"z"] {
            let err = ChannelRequest::new([bad]).to_xml().unwrap_err();
            assert!(matches!(err, SessionError::InvalidRequest(_)), "{bad}");
        }
    }
}
