use models::{RemoteTrigger, Tag, TriggerId};
use reconcile::{Component, Store, StoreError};
use std::time::Duration;

pub mod wire;

/// Client of the Moira HTTP API, which implements a reconcile::Store.
#[derive(Clone)]
pub struct Client {
    // Base URL of the API, such as `https://moira.example/api/`.
    base_url: url::Url,
    http_client: reqwest::Client,
}

impl Client {
    /// Build a Client of the API at `base_url`, with a per-request `timeout`.
    pub fn new(base_url: url::Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("triggerctl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// URL of the API resource having the given path `segments`,
    /// each of which is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<url::Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Other(format!("{} is not a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).trim().to_string(),
            })
        }
    }

    async fn send_json<T>(&self, request: reqwest::RequestBuilder) -> Result<T, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|err| StoreError::Decode(err.to_string()))
    }

    async fn get_trigger(&self, id: &TriggerId) -> Result<RemoteTrigger, StoreError> {
        let url = self.endpoint(&["trigger", id.as_str()])?;
        tracing::debug!(%url, "fetching trigger");

        let wire: wire::Trigger = self
            .send_json(self.http_client.get(url))
            .await
            .map_err(|err| not_found(err, id))?;
        Ok(wire.into())
    }
}

// Map a rejection of a request for trigger `id` as Not Found.
fn not_found(err: StoreError, id: &TriggerId) -> StoreError {
    match err {
        StoreError::Rejected { status: 404, .. } => StoreError::NotFound(id.clone()),
        err => err,
    }
}

#[async_trait::async_trait]
impl Store for Client {
    async fn check(&self, component: Component) -> Result<(), StoreError> {
        let url = self.endpoint(&[component.as_str()])?;
        tracing::debug!(%url, "probing API component");

        self.send(self.http_client.get(url)).await?;
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteTrigger>, StoreError> {
        let url = self.endpoint(&["trigger"])?;
        tracing::debug!(%url, "listing triggers");

        let listed: wire::List<wire::Trigger> = self.send_json(self.http_client.get(url)).await?;
        Ok(listed.list.into_iter().map(Into::into).collect())
    }

    async fn fetch_by_id(&self, id: &TriggerId) -> Result<RemoteTrigger, StoreError> {
        self.get_trigger(id).await
    }

    async fn save(&self, draft: &mut RemoteTrigger) -> Result<(), StoreError> {
        let url = self.endpoint(&["trigger"])?;
        let body = wire::Trigger::from(&*draft);

        let created: wire::Created = self
            .send_json(self.http_client.put(url).json(&body))
            .await?;
        tracing::debug!(id = %created.id, name = %draft.name, "saved new trigger");

        draft.id = Some(created.id);
        Ok(())
    }

    async fn update(&self, trigger: &RemoteTrigger) -> Result<RemoteTrigger, StoreError> {
        let Some(id) = &trigger.id else {
            return Err(StoreError::Other(format!(
                "trigger {:?} must be saved before it's updated",
                trigger.name
            )));
        };
        let url = self.endpoint(&["trigger", id.as_str()])?;
        let body = wire::Trigger::from(trigger);

        self.send(self.http_client.put(url).json(&body))
            .await
            .map_err(|err| not_found(err, id))?;

        // Moira may alter submitted values, so re-read what it stored.
        self.get_trigger(id).await
    }

    async fn delete(&self, id: &TriggerId) -> Result<(), StoreError> {
        let url = self.endpoint(&["trigger", id.as_str()])?;

        self.send(self.http_client.delete(url))
            .await
            .map_err(|err| not_found(err, id))?;
        Ok(())
    }

    async fn stats(&self) -> Result<Vec<Tag>, StoreError> {
        let url = self.endpoint(&["tag", "stats"])?;
        tracing::debug!(%url, "fetching tag statistics");

        let listed: wire::List<Tag> = self.send_json(self.http_client.get(url)).await?;
        Ok(listed.list)
    }

    async fn delete_tag(&self, name: &str) -> Result<(), StoreError> {
        let url = self.endpoint(&["tag", name])?;

        self.send(self.http_client.delete(url)).await?;
        Ok(())
    }
}
