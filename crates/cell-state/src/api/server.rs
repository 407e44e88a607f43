use std::sync::Arc;

use error_stack::Report;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::handlers::get_capabilities;
use super::handlers::get_capacities;
use super::handlers::get_child;
use super::handlers::get_parent;
use super::handlers::get_self;
use super::handlers::list_children;
use super::handlers::list_parents;
use super::ApiError;
use crate::cells::CellStateManager;

/// Build the API routes around a manager
pub fn routes(manager: Arc<CellStateManager>) -> impl Endpoint {
    Route::new()
        .at("/api/v1/cells/self", get(get_self))
        .at("/api/v1/cells/parents", get(list_parents))
        .at("/api/v1/cells/parents/:name", get(get_parent))
        .at("/api/v1/cells/children", get(list_children))
        .at("/api/v1/cells/children/:name", get(get_child))
        .at("/api/v1/capabilities", get(get_capabilities))
        .at("/api/v1/capacities", get(get_capacities))
        .data(manager)
        .with(Tracing)
}

/// HTTP API server for querying cell state
pub struct ApiServer {
    manager: Arc<CellStateManager>,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(manager: Arc<CellStateManager>, listen_addr: String) -> Self {
        Self {
            manager,
            listen_addr,
        }
    }

    /// Serve until `cancellation_token` is cancelled
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind to the address
    pub async fn run(self, cancellation_token: CancellationToken) -> Result<(), Report<ApiError>> {
        info!("Starting HTTP API server on {}", self.listen_addr);

        let app = routes(self.manager);
        let listener = TcpListener::bind(&self.listen_addr);
        let server = Server::new(listener);

        tokio::select! {
            result = server.run(app) => {
                match result {
                    Ok(()) => {
                        info!("API server stopped normally");
                        Ok(())
                    }
                    Err(e) => {
                        error!("API server failed: {e}");
                        Err(Report::new(ApiError::ServerError {
                            message: format!("Server failed: {e}"),
                        }))
                    }
                }
            }
            _ = cancellation_token.cancelled() => {
                info!("API server shutdown requested");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use api_types::Capabilities;
    use api_types::Capacities;
    use api_types::CellInfo;
    use api_types::CellsResponse;
    use api_types::RAM_FREE;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use serde::de::DeserializeOwned;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::cells::mock::{cell_record, compute_node, instance_type, MockDirectoryStore};

    fn test_manager() -> (Arc<MockDirectoryStore>, Arc<CellStateManager>) {
        let store = Arc::new(MockDirectoryStore::new());
        store.set_cells(vec![
            cell_record("parent1", 1, true),
            cell_record("child1", 2, false),
            cell_record("child2", 3, false),
        ]);
        store.set_compute_nodes(vec![compute_node("host1", 4096, 50)]);
        store.set_instance_types(vec![instance_type(1024, 10, 0)]);

        let manager = CellStateManager::builder("api", store.clone())
            .capabilities(vec!["hypervisor=kvm".to_string()])
            .build()
            .expect("should build manager");
        manager
            .update_cell_capabilities(
                "child1",
                vec![("hypervisor".to_string(), vec!["xen".to_string()])],
            )
            .expect("should update child");
        (store, Arc::new(manager))
    }

    async fn get_json<T: DeserializeOwned>(client: &TestClient<impl Endpoint>, uri: &str) -> T {
        let resp = client.get(uri).send().await;
        resp.assert_status_is_ok();
        resp.0
            .into_body()
            .into_json()
            .await
            .expect("should decode response body")
    }

    #[test(tokio::test)]
    async fn self_hides_password() {
        let (_, manager) = test_manager();
        let client = TestClient::new(routes(manager));

        let resp = client.get("/api/v1/cells/self").send().await;
        resp.assert_status_is_ok();
        let body = resp
            .0
            .into_body()
            .into_string()
            .await
            .expect("should read body");
        assert!(!body.contains("password"));

        let parsed: CellsResponse<CellInfo> =
            serde_json::from_str(&body).expect("should decode response body");
        assert!(parsed.success);
        let info = parsed.data.expect("should carry data");
        assert_eq!(info.name, "api");
        assert_eq!(info.id, None);
    }

    #[test(tokio::test)]
    async fn lists_parents_and_children_sorted() {
        let (_, manager) = test_manager();
        let client = TestClient::new(routes(manager));

        let parents: CellsResponse<Vec<CellInfo>> =
            get_json(&client, "/api/v1/cells/parents").await;
        let names: Vec<String> = parents
            .data
            .expect("should carry data")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["parent1".to_string()]);

        let children: CellsResponse<Vec<CellInfo>> =
            get_json(&client, "/api/v1/cells/children").await;
        let children = children.data.expect("should carry data");
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["child1", "child2"]);
        assert_eq!(
            children[0].transport_host.as_deref(),
            Some("child1.cells.local")
        );
    }

    #[test(tokio::test)]
    async fn named_lookup_reports_unknown_cells() {
        let (_, manager) = test_manager();
        let client = TestClient::new(routes(manager));

        let child: CellsResponse<CellInfo> =
            get_json(&client, "/api/v1/cells/children/child1").await;
        assert!(child.success);
        assert_eq!(child.data.map(|c| c.id), Some(Some(2)));

        let wrong_kind: CellsResponse<CellInfo> =
            get_json(&client, "/api/v1/cells/parents/child1").await;
        assert!(!wrong_kind.success);
        assert!(wrong_kind.data.is_none());

        let parent: CellsResponse<CellInfo> =
            get_json(&client, "/api/v1/cells/parents/parent1").await;
        assert_eq!(parent.data.and_then(|c| c.is_parent), Some(true));
    }

    #[test(tokio::test)]
    async fn aggregation_defaults_to_including_children() {
        let (_, manager) = test_manager();
        let client = TestClient::new(routes(manager));

        let all: CellsResponse<Capabilities> = get_json(&client, "/api/v1/capabilities").await;
        assert_eq!(
            all.data.expect("should carry data").get("hypervisor"),
            Some(&BTreeSet::from(["kvm".to_string(), "xen".to_string()]))
        );

        let local: CellsResponse<Capabilities> =
            get_json(&client, "/api/v1/capabilities?include_children=false").await;
        assert_eq!(
            local.data.expect("should carry data").get("hypervisor"),
            Some(&BTreeSet::from(["kvm".to_string()]))
        );

        let capacities: CellsResponse<Capacities> =
            get_json(&client, "/api/v1/capacities").await;
        assert_eq!(
            capacities.data.expect("should carry data")[RAM_FREE].total_mb,
            4096
        );
    }

    #[test(tokio::test)]
    async fn sync_failure_is_server_error() {
        let store = Arc::new(MockDirectoryStore::new());
        // Zero interval forces a pass on every request
        let manager = CellStateManager::builder("api", store.clone())
            .db_check_interval(std::time::Duration::ZERO)
            .build()
            .expect("should build manager");
        store.set_error_mode(true);
        let client = TestClient::new(routes(Arc::new(manager)));

        let resp = client.get("/api/v1/cells/self").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test(tokio::test)]
    async fn server_stops_on_cancellation() {
        let (_, manager) = test_manager();
        let token = CancellationToken::new();
        let server = ApiServer::new(manager, "127.0.0.1:0".to_string());

        token.cancel();
        server
            .run(token)
            .await
            .expect("cancelled server should stop cleanly");
    }
}
