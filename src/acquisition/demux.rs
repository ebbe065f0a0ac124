use crate::types::{ChannelId, EventRecord};

type Predicate = Box<dyn Fn(&EventRecord) -> bool + Send + Sync>;

struct Route {
    tag: String,
    predicate: Predicate,
}

/// Routes records to named destinations. The first matching route wins and
/// records matching no route are dropped.
#[derive(Default)]
pub struct Demultiplexer {
    routes: Vec<Route>,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route<P>(mut self, tag: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        self.routes.push(Route {
            tag: tag.into(),
            predicate: Box::new(predicate),
        });
        self
    }

    /// Route for all records of one readout channel.
    pub fn with_channel(self, tag: impl Into<String>, channel: ChannelId) -> Self {
        self.with_route(tag, move |record| record.channel == channel)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.tag.as_str())
    }

    /// Destination of a single record.
    pub fn demux(&self, record: &EventRecord) -> Option<&str> {
        self.route_index(record).map(|i| self.routes[i].tag.as_str())
    }

    /// Splits a batch into per-destination batches, preserving arrival order
    /// within each destination. Destinations without records are omitted.
    pub fn split(
        &self,
        records: impl IntoIterator<Item = EventRecord>,
    ) -> Vec<(&str, Vec<EventRecord>)> {
        let mut batches: Vec<Vec<EventRecord>> = self.routes.iter().map(|_| Vec::new()).collect();
        for record in records {
            if let Some(i) = self.route_index(&record) {
                batches[i].push(record);
            }
        }
        self.routes
            .iter()
            .zip(batches)
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(route, batch)| (route.tag.as_str(), batch))
            .collect()
    }

    fn route_index(&self, record: &EventRecord) -> Option<usize> {
        self.routes.iter().position(|route| (route.predicate)(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frontends() -> Demultiplexer {
        Demultiplexer::new()
            .with_channel("trigger_fe", 3)
            .with_channel("fe", 4)
    }

    #[test]
    fn routes_by_channel_and_drops_unmatched() {
        let demux = two_frontends();
        assert_eq!(demux.demux(&EventRecord::hit(3, 1, 1, 0)), Some("trigger_fe"));
        assert_eq!(demux.demux(&EventRecord::hit(4, 1, 1, 0)), Some("fe"));
        assert_eq!(demux.demux(&EventRecord::hit(7, 1, 1, 0)), None);
    }

    #[test]
    fn split_preserves_order_per_channel() {
        let demux = two_frontends();
        let records = vec![
            EventRecord::hit(4, 1, 1, 0),
            EventRecord::hit(3, 1, 2, 0),
            EventRecord::hit(9, 1, 3, 0),
            EventRecord::hit(4, 1, 4, 0),
            EventRecord::hit(3, 1, 5, 0),
            EventRecord::hit(4, 1, 6, 0),
        ];
        let batches = demux.split(records);
        let rows = |batch: &Vec<EventRecord>| -> Vec<u16> {
            batch.iter().filter_map(|r| r.as_hit()).map(|h| h.row).collect()
        };
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "trigger_fe");
        assert_eq!(rows(&batches[0].1), vec![2, 5]);
        assert_eq!(batches[1].0, "fe");
        assert_eq!(rows(&batches[1].1), vec![1, 4, 6]);
    }

    #[test]
    fn first_matching_route_wins() {
        let demux = Demultiplexer::new()
            .with_route("hits", |r: &EventRecord| r.is_hit())
            .with_channel("fe", 4);
        assert_eq!(demux.demux(&EventRecord::hit(4, 1, 1, 0)), Some("hits"));
        assert!(demux.split(Vec::new()).is_empty());
    }
}
