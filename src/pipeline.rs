//!
//! One report run: authenticate, seed, enrich, render, dispatch.
//!
//! A failing stage never aborts the run. Each failure is recorded in the [`RunSummary`] and
//! the remaining stages carry on, so a partial report is still delivered.
use crate::aggregate::{Aggregate, EnrichOutcome, SeedOutcome};
use crate::config::Config;
use crate::monitoring::{self, Report};
use crate::render::{html, spreadsheet};
use crate::{dispatch, Client, ClientBuilder, Result};
use chrono::NaiveDateTime;

/// What happened to one report dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionStatus {
    Seeded(SeedOutcome),
    Enriched(EnrichOutcome),
    Failed(String),
}

/// Status of one report dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionOutcome {
    pub report: Report,
    pub status: DimensionStatus,
}

/// What happened to one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered(String),
    Failed(String),
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub authenticated: bool,
    pub dimensions: Vec<DimensionOutcome>,
    pub aggregate: Aggregate,
    pub spreadsheet: DeliveryStatus,
    pub email: DeliveryStatus,
}

impl RunSummary {
    /// True when every stage succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.authenticated
            && self
                .dimensions
                .iter()
                .all(|d| !matches!(d.status, DimensionStatus::Failed(_)))
            && matches!(self.spreadsheet, DeliveryStatus::Delivered(_))
            && matches!(self.email, DeliveryStatus::Delivered(_))
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered(detail) => write!(f, "delivered ({detail})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "authenticated: {}", self.authenticated)?;
        writeln!(f, "applications: {}", self.aggregate.len())?;
        for dimension in &self.dimensions {
            match &dimension.status {
                DimensionStatus::Seeded(o) => writeln!(
                    f,
                    "{}: {} records, {} duplicates",
                    dimension.report, o.records, o.duplicates
                )?,
                DimensionStatus::Enriched(o) => writeln!(
                    f,
                    "{}: {} applied, {} dropped",
                    dimension.report, o.applied, o.dropped
                )?,
                DimensionStatus::Failed(reason) => {
                    writeln!(f, "{}: failed: {}", dimension.report, reason)?;
                }
            }
        }
        writeln!(f, "spreadsheet: {}", self.spreadsheet)?;
        write!(f, "email: {}", self.email)
    }
}

const NOT_AUTHENTICATED: &str = "not authenticated";

/// Exchange the configured client credentials for a bearer token
#[tracing::instrument(skip_all, fields(token_url = %config.token_url))]
pub async fn authenticate(config: &Config) -> Result<Client> {
    let builder = ClientBuilder::new();
    let builder = if config.accept_invalid_certs {
        builder.danger_accept_invalid_certs()
    } else {
        builder
    };

    let client = builder
        .client_credentials_login(
            &config.token_url,
            &config.api_base_url,
            &config.client_id,
            &config.client_secret,
        )
        .await?;
    tracing::info!("Access token retrieved");
    Ok(client)
}

async fn fetch(
    client: Option<&Client>,
    config: &Config,
    report: Report,
) -> std::result::Result<Vec<monitoring::ApplicationEntry>, String> {
    let client = client.ok_or_else(|| NOT_AUTHENTICATED.to_string())?;
    monitoring::fetch_report(
        client,
        &config.organization_id,
        &config.environment_id,
        report,
        config.time_window(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Error calling {} report: {}", report, e);
        e.to_string()
    })
}

fn log_aggregate(aggregate: &Aggregate) {
    for record in aggregate {
        tracing::debug!("\n{}", record);
    }
}

/// Fetch the request volume report and build the aggregate from it
#[tracing::instrument(skip_all)]
pub async fn seed(client: Option<&Client>, config: &Config) -> (Aggregate, DimensionOutcome) {
    let report = Report::RequestVolume;
    let (aggregate, status) = match fetch(client, config, report).await {
        Ok(entries) => {
            let (aggregate, outcome) = Aggregate::seed(&entries);
            (aggregate, DimensionStatus::Seeded(outcome))
        }
        Err(reason) => (Aggregate::new(), DimensionStatus::Failed(reason)),
    };
    log_aggregate(&aggregate);
    (aggregate, DimensionOutcome { report, status })
}

/// Fetch one enrichment report and merge it into the aggregate
#[tracing::instrument(skip(client, config, aggregate))]
pub async fn enrich(
    client: Option<&Client>,
    config: &Config,
    report: Report,
    mut aggregate: Aggregate,
) -> (Aggregate, DimensionOutcome) {
    let status = match fetch(client, config, report).await {
        Ok(entries) => {
            let outcome = aggregate.apply(report, &entries);
            if outcome.dropped > 0 {
                tracing::debug!(
                    "{} {} entries without a request volume record",
                    outcome.dropped,
                    report
                );
            }
            DimensionStatus::Enriched(outcome)
        }
        Err(reason) => DimensionStatus::Failed(reason),
    };
    log_aggregate(&aggregate);
    (aggregate, DimensionOutcome { report, status })
}

/// Run every report in order and return the merged aggregate
pub async fn collect(client: Option<&Client>, config: &Config) -> (Aggregate, Vec<DimensionOutcome>) {
    let (mut aggregate, outcome) = seed(client, config).await;
    let mut dimensions = vec![outcome];

    for report in Report::ALL.into_iter().filter(|r| !r.is_seed()) {
        let (enriched, outcome) = enrich(client, config, report, aggregate).await;
        aggregate = enriched;
        dimensions.push(outcome);
    }
    (aggregate, dimensions)
}

/// Render and deliver the report
pub async fn deliver(
    aggregate: &Aggregate,
    config: &Config,
    generated_at: &NaiveDateTime,
) -> (DeliveryStatus, DeliveryStatus) {
    let spreadsheet = match spreadsheet::render(aggregate, generated_at) {
        Ok(bytes) => match dispatch::write_spreadsheet(&config.output_file, &bytes).await {
            Ok(()) => DeliveryStatus::Delivered(config.output_file.display().to_string()),
            Err(e) => {
                tracing::warn!("Error writing spreadsheet: {}", e);
                DeliveryStatus::Failed(e.to_string())
            }
        },
        Err(e) => {
            tracing::warn!("Error rendering spreadsheet: {}", e);
            DeliveryStatus::Failed(e.to_string())
        }
    };

    let body = html::render(
        aggregate,
        &config.environment,
        config.time_window(),
        generated_at,
    );
    let email = match dispatch::send_email(config, body).await {
        Ok(response) => DeliveryStatus::Delivered(response),
        Err(e) => {
            tracing::warn!("Error sending email: {}", e);
            DeliveryStatus::Failed(e.to_string())
        }
    };

    (spreadsheet, email)
}

/// Full run with the report stamped at `generated_at`
#[tracing::instrument(skip_all, fields(environment = %config.environment))]
pub async fn run_at(config: &Config, generated_at: &NaiveDateTime) -> RunSummary {
    let client = match authenticate(config).await {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!("Error retrieving access token: {}", e);
            None
        }
    };

    let (aggregate, dimensions) = collect(client.as_ref(), config).await;
    let (spreadsheet, email) = deliver(&aggregate, config, generated_at).await;

    RunSummary {
        authenticated: client.is_some(),
        dimensions,
        aggregate,
        spreadsheet,
        email,
    }
}

/// Full run stamped with the local time
pub async fn run(config: &Config) -> RunSummary {
    run_at(config, &chrono::Local::now().naive_local()).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dispatch::test::{closed_port, config};

    const WINDOW: &str = "from/now-1d/to/now";

    fn path(report: Report) -> String {
        format!("/{}", monitoring::report_path("org", "env", report, WINDOW))
    }

    fn server_config(server: &mockito::Server, dir: &temp_dir::TempDir) -> Config {
        let mut config = config();
        config.api_base_url = server.url();
        config.token_url = format!("{}/token", server.url());
        config.mail_port = closed_port();
        config.output_file = dir.child("appReportMetrics.xlsx");
        config
    }

    async fn mock_token(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"abc"}"#)
            .create_async()
            .await
    }

    async fn mock_report(server: &mut mockito::Server, report: Report, body: &str) -> mockito::Mock {
        server
            .mock("GET", path(report).as_str())
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    const SEED: &str = r#"{"applicationData":[
        {"appId":"a2","orgName":"Org","envName":"Prod","requestVolume":10,"successfulRequests":10,"failedRequests":0,"responseTime":9.5},
        {"appId":"a1","orgName":"Org","envName":"Prod","requestVolume":100,"successfulRequests":90,"failedRequests":5}
    ]}"#;

    fn timestamp() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn seed_then_cpu_enrichment() {
        let mut server = mockito::Server::new_async().await;
        let dir = temp_dir::TempDir::new().unwrap();
        let config = server_config(&server, &dir);
        let _token = mock_token(&mut server).await;
        let _seed = mock_report(&mut server, Report::RequestVolume, SEED).await;
        let _cpu = mock_report(
            &mut server,
            Report::CpuUtilization,
            r#"{"applicationData":[{"appId":"a1","cpuUtilization":"55.5"},{"appId":"zz","cpuUtilization":1}]}"#,
        )
        .await;

        let client = authenticate(&config).await.unwrap();
        let (aggregate, dimensions) = collect(Some(&client), &config).await;

        let ids: Vec<_> = aggregate.iter().map(|r| r.app_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        assert_eq!(aggregate.get("a1").unwrap().cpu_utilization, Some(55.5));
        assert_eq!(aggregate.get("a2").unwrap().cpu_utilization, None);

        let cells = crate::render::record_cells(aggregate.get("a1").unwrap());
        assert_eq!(cells[7].to_string(), "55.50");

        assert_eq!(
            dimensions[0].status,
            DimensionStatus::Seeded(SeedOutcome { records: 2, duplicates: 0 })
        );
        assert_eq!(
            dimensions[3],
            DimensionOutcome {
                report: Report::CpuUtilization,
                status: DimensionStatus::Enriched(EnrichOutcome { applied: 1, dropped: 1 }),
            }
        );
        // Unmocked reports answer 501
        assert!(matches!(dimensions[1].status, DimensionStatus::Failed(_)));
        assert_eq!(dimensions.len(), 5);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_existing_values() {
        let mut server = mockito::Server::new_async().await;
        let dir = temp_dir::TempDir::new().unwrap();
        let config = server_config(&server, &dir);
        let _token = mock_token(&mut server).await;
        let _seed = mock_report(&mut server, Report::RequestVolume, SEED).await;
        let _perf = server
            .mock("GET", path(Report::Performance).as_str())
            .with_status(500)
            .create_async()
            .await;
        let _failures = mock_report(
            &mut server,
            Report::Failures,
            r#"{"applicationData":[{"appId":"a1","failedRequests":8}]}"#,
        )
        .await;

        let client = authenticate(&config).await.unwrap();
        let (aggregate, dimensions) = collect(Some(&client), &config).await;

        assert_eq!(
            dimensions[1].status,
            DimensionStatus::Failed("HTTP failed 500, 500 Internal Server Error".into())
        );
        assert_eq!(aggregate.get("a2").unwrap().response_time, Some(9.5));
        assert_eq!(aggregate.get("a1").unwrap().failed_requests, Some(8));
        assert_eq!(aggregate.get("a2").unwrap().failed_requests, Some(0));
    }

    #[tokio::test]
    async fn partial_report_is_still_delivered() {
        let mut server = mockito::Server::new_async().await;
        let dir = temp_dir::TempDir::new().unwrap();
        let config = server_config(&server, &dir);
        let _token = mock_token(&mut server).await;
        let _seed = mock_report(&mut server, Report::RequestVolume, SEED).await;

        let summary = run_at(&config, &timestamp()).await;

        assert!(summary.authenticated);
        assert_eq!(summary.aggregate.len(), 2);
        assert_eq!(
            summary.spreadsheet,
            DeliveryStatus::Delivered(config.output_file.display().to_string())
        );
        assert!(config.output_file.exists());
        // Nothing listens on the SMTP port
        assert!(matches!(summary.email, DeliveryStatus::Failed(_)));
        assert!(!summary.is_complete());
        assert!(summary.to_string().contains("requests: 2 records, 0 duplicates"));
    }

    // Without a token the run still produces and dispatches an empty report
    #[tokio::test]
    async fn unauthenticated_run_still_reaches_dispatch() {
        let mut server = mockito::Server::new_async().await;
        let dir = temp_dir::TempDir::new().unwrap();
        let config = server_config(&server, &dir);
        let _token = server
            .mock("POST", "/token")
            .with_status(401)
            .with_body("denied")
            .create_async()
            .await;
        let seed = server
            .mock("GET", path(Report::RequestVolume).as_str())
            .expect(0)
            .create_async()
            .await;

        let summary = run_at(&config, &timestamp()).await;

        assert!(!summary.authenticated);
        assert!(summary.aggregate.is_empty());
        assert!(summary
            .dimensions
            .iter()
            .all(|d| d.status == DimensionStatus::Failed(NOT_AUTHENTICATED.into())));
        assert!(matches!(summary.spreadsheet, DeliveryStatus::Delivered(_)));
        assert!(matches!(summary.email, DeliveryStatus::Failed(_)));
        seed.assert_async().await;
    }

    // Missing settings still end in a written spreadsheet and an attempted send
    #[tokio::test]
    async fn incomplete_configuration_still_reaches_dispatch() {
        let mut server = mockito::Server::new_async().await;
        let dir = temp_dir::TempDir::new().unwrap();
        let _token = server
            .mock("POST", "/token")
            .with_status(401)
            .with_body("missing client secret")
            .create_async()
            .await;

        let base_url = server.url();
        let token_url = format!("{}/token", server.url());
        let output_file = dir.child("appReportMetrics.xlsx").display().to_string();
        let mail_port = closed_port().to_string();
        let vars = std::collections::HashMap::from([
            ("METRICS_CLIENT_ID", "id"),
            ("ANYPOINT_BASE_URL", base_url.as_str()),
            ("ANYPOINT_TOKEN_URL", token_url.as_str()),
            ("REPORT_OUTPUT_FILE", output_file.as_str()),
            ("MAIL_HOST", "127.0.0.1"),
            ("MAIL_PORT", mail_port.as_str()),
        ]);
        let (config, problems) =
            Config::from_lookup_partial(|key| vars.get(key).map(|v| (*v).to_string()));
        assert!(!problems.is_empty());

        let summary = run_at(&config, &timestamp()).await;

        assert!(!summary.authenticated);
        assert!(matches!(summary.spreadsheet, DeliveryStatus::Delivered(_)));
        assert!(std::path::Path::new(&output_file).exists());
        // MAIL_FROM and MAIL_TO are empty, so the send fails on the addresses
        assert!(matches!(&summary.email, DeliveryStatus::Failed(reason) if reason.starts_with("Mail address")));
    }

    #[tokio::test]
    async fn enrichment_before_seed_drops_everything() {
        let config = config();
        let (aggregate, outcome) = enrich(None, &config, Report::Failures, Aggregate::new()).await;
        assert!(aggregate.is_empty());
        assert_eq!(outcome.status, DimensionStatus::Failed(NOT_AUTHENTICATED.into()));
    }
}
