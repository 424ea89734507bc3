//! Component-URL fan-out (§5). A component's pre-resolve step may fan
//! out across its URLs; resolution of many URLs for many components may
//! proceed in parallel. The VFS/executor pair itself stays fully
//! synchronous — this module only concerns the async edges around it.

use crate::model::{Component, ComponentId};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

/// Per-URL resolution outcome. The actual provider dispatch
/// (`can_handle`/`resolve_filenames`/`get_metadata`) lives outside this
/// crate's scope (spec §6: "not this core"); this type is the shape a
/// caller-supplied resolver function returns.
#[derive(Debug, Clone)]
pub struct UrlResolution {
    pub url: String,
    pub resolved_filenames: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PreResolved {
    pub component_id: ComponentId,
    pub resolutions: Vec<UrlResolution>,
    pub cancelled: bool,
}

/// Spawns one task per component and resolves every URL inside it
/// concurrently via `join_all`. Cancellation is polled before each
/// component's URLs are dispatched and again before returning, so a
/// cancelled run never starts fresh work but lets in-flight resolutions
/// already spawned in this call finish so results stay consistent.
pub async fn resolve_all<F, Fut>(
    components: &[Component],
    cancellation: CancellationToken,
    resolve_one: F,
) -> Vec<PreResolved>
where
    F: Fn(String) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = UrlResolution> + Send,
{
    let tasks = components.iter().map(|component| {
        let component_id = component.id;
        let urls = component.mod_links.clone();
        let resolve_one = resolve_one.clone();
        let cancellation = cancellation.clone();
        async move {
            if cancellation.is_cancelled() {
                return PreResolved {
                    component_id,
                    resolutions: Vec::new(),
                    cancelled: true,
                };
            }
            let futures = urls.into_iter().map(|url| resolve_one(url));
            let resolutions = join_all(futures).await;
            PreResolved {
                component_id,
                resolutions,
                cancelled: cancellation.is_cancelled(),
            }
        }
    });

    join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Component;

    #[tokio::test]
    async fn resolves_every_url_per_component() {
        let mut c1 = Component::new("A", "Author");
        c1.mod_links = vec!["https://a/1".into(), "https://a/2".into()];
        let mut c2 = Component::new("B", "Author");
        c2.mod_links = vec!["https://b/1".into()];

        let results = resolve_all(&[c1, c2], CancellationToken::new(), |url| async move {
            UrlResolution {
                resolved_filenames: vec![format!("{url}.zip")],
                url,
            }
        })
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].resolutions.len(), 2);
        assert_eq!(results[1].resolutions.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_dispatch() {
        let mut c1 = Component::new("A", "Author");
        c1.mod_links = vec!["https://a/1".into()];
        let token = CancellationToken::new();
        token.cancel();

        let results = resolve_all(&[c1], token, |url| async move {
            UrlResolution {
                resolved_filenames: vec![url.clone()],
                url,
            }
        })
        .await;

        assert!(results[0].cancelled);
        assert!(results[0].resolutions.is_empty());
    }
}
