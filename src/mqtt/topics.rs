/// Topic roots for one bridge, derived once from its configured id.
///
/// The bridge listens on `/<id>radin/...` and answers on `/<id>radout/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    in_topic: String,
    out_topic: String,
    scan: String,
    command: String,
    subscribe: String,
    devlist: String,
    status: String,
}

impl Topics {
    /// Strip one leading and one trailing `/` from `mqtt_id` and build the pair.
    pub fn new(mqtt_id: &str) -> Self {
        let id = mqtt_id.strip_prefix('/').unwrap_or(mqtt_id);
        let id = id.strip_suffix('/').unwrap_or(id);

        let in_topic = format!("/{id}radin");
        let out_topic = format!("/{id}radout");

        Self {
            scan: format!("{in_topic}/scan"),
            command: format!("{in_topic}/trv"),
            subscribe: format!("{out_topic}/#"),
            devlist: format!("{out_topic}/devlist"),
            status: format!("{out_topic}/status"),
            in_topic,
            out_topic,
        }
    }

    pub fn in_topic(&self) -> &str {
        &self.in_topic
    }

    pub fn out_topic(&self) -> &str {
        &self.out_topic
    }

    pub fn scan_topic(&self) -> &str {
        &self.scan
    }

    pub fn command_topic(&self) -> &str {
        &self.command
    }

    /// Wildcard covering every reply from the bridge.
    pub fn subscribe_topic(&self) -> &str {
        &self.subscribe
    }

    pub fn devlist_topic(&self) -> &str {
        &self.devlist
    }

    pub fn status_topic(&self) -> &str {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashes_are_trimmed_once() {
        for id in ["foo", "/foo/", "foo/", "/foo"] {
            let topics = Topics::new(id);
            assert_eq!(topics.in_topic(), "/fooradin", "id {id:?}");
            assert_eq!(topics.out_topic(), "/fooradout", "id {id:?}");
        }
    }

    #[test]
    fn only_one_slash_is_trimmed_per_side() {
        let topics = Topics::new("//foo");
        assert_eq!(topics.in_topic(), "//fooradin");
    }

    #[test]
    fn derived_topics() {
        let topics = Topics::new("esp32/eq3/");
        assert_eq!(topics.scan_topic(), "/esp32/eq3radin/scan");
        assert_eq!(topics.command_topic(), "/esp32/eq3radin/trv");
        assert_eq!(topics.subscribe_topic(), "/esp32/eq3radout/#");
        assert_eq!(topics.devlist_topic(), "/esp32/eq3radout/devlist");
        assert_eq!(topics.status_topic(), "/esp32/eq3radout/status");
    }
}
