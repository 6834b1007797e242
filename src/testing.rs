//! An in-process stand-in for the `/sdk` endpoint of an ESXi host or vCenter.
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use quick_xml::escape::escape;
use url::Url;

use crate::config::ConnectionConfig;

const SESSION_COOKIE: &str = "vmware_soap_session=52f3a9c1-fake";

pub(crate) struct FakeCounter {
    pub group: &'static str,
    pub name: &'static str,
    pub rollup: &'static str,
    pub level: Option<i32>,
    pub summary: &'static str,
}

pub(crate) struct FakeSdk {
    pub api_type: &'static str,
    pub username: &'static str,
    pub password: &'static str,
    pub counters: Vec<FakeCounter>,
    /// Report `perfCounter` in the missing set instead of returning it.
    pub missing_perf_counter: bool,
    /// Hold every request open instead of answering.
    pub stall: bool,
    pub logouts: AtomicUsize,
}

impl FakeSdk {
    pub(crate) fn vcenter() -> Self {
        Self {
            api_type: "VirtualCenter",
            username: "administrator@vsphere.local",
            password: "p@ss&word",
            ..Self::esxi()
        }
    }

    pub(crate) fn esxi() -> Self {
        Self {
            api_type: "HostAgent",
            username: "root",
            password: "secret",
            counters: default_counters(),
            missing_perf_counter: false,
            stall: false,
            logouts: AtomicUsize::new(0),
        }
    }

    /// Serve on an ephemeral localhost port. The returned URL carries no credentials.
    pub(crate) async fn spawn(self) -> (Arc<Self>, Url) {
        let sdk = Arc::new(self);
        let app = Router::new()
            .route("/sdk", post(handle))
            .with_state(sdk.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (sdk, Url::parse(&format!("http://{addr}/sdk")).unwrap())
    }

    fn service_content(&self) -> String {
        format!(
            "<RetrieveServiceContentResponse xmlns=\"urn:vim25\"><returnval><rootFolder type=\"Folder\">group-d1</rootFolder><propertyCollector type=\"PropertyCollector\">propertyCollector</propertyCollector><about><name>fake</name><fullName>Fake SDK 7.0</fullName><apiType>{}</apiType><apiVersion>7.0.3.0</apiVersion></about><sessionManager type=\"SessionManager\">SessionManager</sessionManager><perfManager type=\"PerformanceManager\">PerfMgr</perfManager></returnval></RetrieveServiceContentResponse>",
            self.api_type
        )
    }

    fn perf_manager_content(&self, body: &str) -> String {
        if !body.contains("<obj type=\"PerformanceManager\">PerfMgr</obj>") {
            return "<RetrievePropertiesExResponse xmlns=\"urn:vim25\"></RetrievePropertiesExResponse>".to_string();
        }

        let props = if self.missing_perf_counter {
            "<missingSet><path>perfCounter</path><fault><fault xsi:type=\"NoPermission\"></fault></fault></missingSet>".to_string()
        } else if self.counters.is_empty() {
            // Empty arrays are left out of the property set.
            String::new()
        } else {
            let counters: String = self
                .counters
                .iter()
                .enumerate()
                .map(|(key, counter)| counter.to_xml(key + 1))
                .collect();
            format!(
                "<propSet><name>perfCounter</name><val xsi:type=\"ArrayOfPerfCounterInfo\">{counters}</val></propSet>"
            )
        };

        format!(
            "<RetrievePropertiesExResponse xmlns=\"urn:vim25\"><returnval><objects><obj type=\"PerformanceManager\">PerfMgr</obj>{props}</objects></returnval></RetrievePropertiesExResponse>"
        )
    }
}

impl FakeCounter {
    fn to_xml(&self, key: usize) -> String {
        let level = self
            .level
            .map(|level| format!("<level>{level}</level>"))
            .unwrap_or_default();
        format!(
            "<PerfCounterInfo><key>{key}</key><nameInfo xsi:type=\"ElementDescription\"><label>{name}</label><summary>{summary}</summary><key>{name}</key></nameInfo><groupInfo xsi:type=\"ElementDescription\"><label>{group}</label><summary>{group}</summary><key>{group}</key></groupInfo><unitInfo xsi:type=\"ElementDescription\"><label>KBps</label><summary>Kilobytes per second</summary><key>kiloBytesPerSecond</key></unitInfo><rollupType>{rollup}</rollupType><statsType>rate</statsType>{level}</PerfCounterInfo>",
            name = self.name,
            group = self.group,
            rollup = self.rollup,
            summary = escape(self.summary),
        )
    }
}

fn default_counters() -> Vec<FakeCounter> {
    vec![
        FakeCounter {
            group: "cpu",
            name: "usage",
            rollup: "average",
            level: Some(1),
            summary: "CPU usage as a percentage during the interval",
        },
        FakeCounter {
            group: "mem",
            name: "swapin",
            rollup: "maximum",
            level: None,
            summary: "Amount of memory swapped in",
        },
        FakeCounter {
            group: "disk",
            name: "read",
            rollup: "average",
            level: Some(2),
            summary: "Average number of kilobytes read from the disk, \"per second\"",
        },
    ]
}

async fn handle(State(sdk): State<Arc<FakeSdk>>, headers: HeaderMap, body: String) -> Response {
    if sdk.stall {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    let authenticated = headers
        .get(header::COOKIE)
        .and_then(|cookie| cookie.to_str().ok())
        .is_some_and(|cookie| cookie.contains(SESSION_COOKIE));

    if body.contains("<RetrieveServiceContent ") {
        ok(sdk.service_content())
    } else if body.contains("<Login ") {
        let user = format!("<userName>{}</userName>", escape(sdk.username));
        let password = format!("<password>{}</password>", escape(sdk.password));
        if body.contains(&user) && body.contains(&password) {
            let login = format!(
                "<LoginResponse xmlns=\"urn:vim25\"><returnval><key>52a1</key><userName>{}</userName></returnval></LoginResponse>",
                escape(sdk.username)
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/xml; charset=utf-8"),
                    (header::SET_COOKIE, "vmware_soap_session=52f3a9c1-fake; Path=/; HttpOnly"),
                ],
                envelope(&login),
            )
                .into_response()
        } else {
            fault("Cannot complete login due to an incorrect user name or password.")
        }
    } else if !authenticated {
        fault("The session is not authenticated.")
    } else if body.contains("<RetrievePropertiesEx ") {
        ok(sdk.perf_manager_content(&body))
    } else if body.contains("<Logout ") {
        sdk.logouts.fetch_add(1, Ordering::SeqCst);
        ok("<LogoutResponse xmlns=\"urn:vim25\"></LogoutResponse>".to_string())
    } else {
        fault("Unsupported method")
    }
}

fn envelope(content: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<soapenv:Envelope xmlns:soapenc=\"http://schemas.xmlsoap.org/soap/encoding/\" xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n<soapenv:Body>\n{content}\n</soapenv:Body>\n</soapenv:Envelope>"
    )
}

fn ok(content: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        envelope(&content),
    )
        .into_response()
}

fn fault(message: &str) -> Response {
    let content = format!(
        "<soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>{}</faultstring><detail></detail></soapenv:Fault>",
        escape(message)
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        envelope(&content),
    )
        .into_response()
}

pub(crate) fn with_credentials(url: &Url, username: &str, password: &str) -> Url {
    let mut url = url.clone();
    url.set_username(username).unwrap();
    url.set_password(Some(password)).unwrap();
    url
}

pub(crate) fn config(endpoint: Url) -> ConnectionConfig {
    ConnectionConfig {
        endpoint,
        verify_tls: true,
        timeout: Duration::from_secs(5),
    }
}
