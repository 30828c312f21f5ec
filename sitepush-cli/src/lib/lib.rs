use futures::{future, Future};

mod error;

pub mod fingerprint;
pub mod local;
pub mod oauth2;
pub mod provision;
pub mod storage;
pub mod sync;

pub mod uri {
    #[derive(Debug)]
    pub struct QueryMap<'a>(Vec<(&'a str, &'a str)>);

    impl<'a> QueryMap<'a> {
        pub fn parse(query: Option<&'a str>) -> QueryMap<'a> {
            let vec = query
                .into_iter()
                .flat_map(|q| q.split('&'))
                .filter(|part| !part.is_empty())
                .map(|part| part.split_once('=').unwrap_or((part, "")))
                .collect();
            QueryMap(vec)
        }

        pub fn get(&self, key: &str) -> Option<&'a str> {
            self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
        }
    }

    #[test]
    fn query_map() {
        let q = QueryMap::parse(Some("state=abc&code=4/0Ad&scope=drive&flag"));
        assert_eq!(q.get("code"), Some("4/0Ad"));
        assert_eq!(q.get("state"), Some("abc"));
        assert_eq!(q.get("flag"), Some(""));
        assert_eq!(q.get("error"), None);
        assert_eq!(QueryMap::parse(None).get("code"), None);
    }
}

/// Implemented by components that keep state worth saving on exit
pub trait PersistCache {
    fn persist_cache(&self) -> impl Future<Output = anyhow::Result<()>> + Send {
        future::ready(Ok(()))
    }
}
