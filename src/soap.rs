//! Minimal vSphere Web Services client: just enough of vim25 to log in, read one managed
//! object and log out again.
use std::sync::Arc;

use quick_xml::escape::escape;
use reqwest::{cookie::Jar, header, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::ConnectionConfig,
    error::{AppError, AppResult},
    models::{ManagedObjectReference, ObjectContent, Response, ServiceContent},
    session::Session,
};

const SOAP_ACTION: &str = "urn:vim25/6.0";

pub(crate) struct VimClient {
    http: reqwest::Client,
    /// SDK URL with the credentials stripped.
    endpoint: Url,
    content: ServiceContent,
    logged_in: bool,
}

impl VimClient {
    /// Open a session: fetch the service content, then log in with the URL's credentials.
    pub(crate) async fn connect(config: &ConnectionConfig) -> AppResult<Self> {
        let mut endpoint = config.endpoint.clone();
        let credentials = take_credentials(&mut endpoint)?;

        let http = reqwest::ClientBuilder::new()
            .cookie_provider(Arc::new(Jar::default()))
            .danger_accept_invalid_certs(!config.verify_tls)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(connection_error(&endpoint))?;

        let this = ManagedObjectReference::new("ServiceInstance", "ServiceInstance");
        let body = format!(
            "<RetrieveServiceContent xmlns=\"urn:vim25\">{}</RetrieveServiceContent>",
            this.to_xml("_this")
        );
        let content = match call(&http, &endpoint, "RetrieveServiceContent", &body).await? {
            Response::RetrieveServiceContentResponse { returnval } => returnval,
            other => return Err(unexpected("RetrieveServiceContent", &other)),
        };

        info!(
            server = %content.about.full_name,
            api_type = %content.about.api_type,
            api_version = %content.about.api_version,
            "retrieved service content"
        );

        let mut client = Self {
            http,
            endpoint,
            content,
            logged_in: false,
        };

        match credentials {
            Some((username, password)) => {
                client.login(&username, &password).await?;
                client.logged_in = true;
            }
            None => warn!("no credentials in URL, continuing without login"),
        }

        Ok(client)
    }

    async fn login(&self, username: &str, password: &str) -> AppResult<()> {
        let session_manager = self.content.session_manager.as_ref().ok_or_else(|| {
            AppError::Authentication("server does not advertise a session manager".into())
        })?;

        let body = format!(
            "<Login xmlns=\"urn:vim25\">{}<userName>{}</userName><password>{}</password></Login>",
            session_manager.to_xml("_this"),
            escape(username),
            escape(password)
        );

        match self.invoke("Login", &body).await {
            Ok(Response::LoginResponse { returnval }) => {
                info!(user = %returnval.user_name, "logged in");
                Ok(())
            }
            Ok(other) => Err(unexpected("Login", &other)),
            Err(AppError::Fault { fault, .. }) => Err(AppError::Authentication(fault)),
            Err(err) => Err(err),
        }
    }

    async fn invoke(&self, method: &'static str, body: &str) -> AppResult<Response> {
        call(&self.http, &self.endpoint, method, body).await
    }
}

impl Session for VimClient {
    fn is_vcenter(&self) -> bool {
        self.content.about.api_type == "VirtualCenter"
    }

    fn perf_manager(&self) -> Option<&ManagedObjectReference> {
        self.content.perf_manager.as_ref()
    }

    async fn retrieve_one(
        &self,
        obj: &ManagedObjectReference,
        props: &[&str],
    ) -> AppResult<ObjectContent> {
        let path_set: String = props
            .iter()
            .map(|path| format!("<pathSet>{}</pathSet>", escape(*path)))
            .collect();

        let body = format!(
            "<RetrievePropertiesEx xmlns=\"urn:vim25\">{}<specSet><propSet><type>{}</type><all>{}</all>{}</propSet><objectSet>{}<skip>false</skip></objectSet></specSet><options></options></RetrievePropertiesEx>",
            self.content.property_collector.to_xml("_this"),
            escape(obj.kind.as_str()),
            props.is_empty(),
            path_set,
            obj.to_xml("obj")
        );

        let result = match self.invoke("RetrievePropertiesEx", &body).await? {
            Response::RetrievePropertiesExResponse { returnval } => returnval.unwrap_or_default(),
            other => return Err(unexpected("RetrievePropertiesEx", &other)),
        };

        let object = result
            .objects
            .into_iter()
            .find(|object| &object.obj == obj)
            .ok_or_else(|| {
                AppError::Retrieval(format!("{} {} was not returned", obj.kind, obj.value))
            })?;

        if let Some(missing) = object.missing_set.first() {
            return Err(AppError::Retrieval(format!(
                "property {} of {} could not be read",
                missing.path, obj.value
            )));
        }

        Ok(object)
    }

    async fn logout(&self) -> AppResult<()> {
        if !self.logged_in {
            return Ok(());
        }
        let Some(session_manager) = self.content.session_manager.as_ref() else {
            return Ok(());
        };

        let body = format!(
            "<Logout xmlns=\"urn:vim25\">{}</Logout>",
            session_manager.to_xml("_this")
        );
        match self.invoke("Logout", &body).await? {
            Response::LogoutResponse {} => {
                debug!("logged out");
                Ok(())
            }
            other => Err(unexpected("Logout", &other)),
        }
    }
}

/// Remove the userinfo from `url`, returning it percent-decoded.
fn take_credentials(url: &mut Url) -> AppResult<Option<(String, String)>> {
    let username = url.username().to_string();
    let password = url.password().map(str::to_string);

    if username.is_empty() && password.is_none() {
        return Ok(None);
    }

    let decode = |value: &str| {
        urlencoding::decode(value)
            .map(|decoded| decoded.into_owned())
            .map_err(|err| AppError::Configuration {
                url: url.to_string(),
                reason: format!("credentials are not valid UTF-8: {err}"),
            })
    };
    let credentials = (
        decode(&username)?,
        decode(password.as_deref().unwrap_or_default())?,
    );

    let stripped = url.set_username("").and_then(|()| url.set_password(None));
    debug_assert!(stripped.is_ok(), "resolved endpoints always have a host");

    Ok(Some(credentials))
}

fn connection_error(endpoint: &Url) -> impl Fn(reqwest::Error) -> AppError + '_ {
    move |source| AppError::Connection {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn unexpected(method: &'static str, response: &Response) -> AppError {
    AppError::Protocol {
        method,
        reason: format!("got {}", response.kind()),
    }
}

/// POST one SOAP request. Server faults arrive as HTTP 500 and become [`AppError::Fault`].
async fn call(
    http: &reqwest::Client,
    endpoint: &Url,
    method: &'static str,
    body: &str,
) -> AppResult<Response> {
    let envelope = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"><soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"
    );

    debug!(method, "sending request");

    let response = http
        .post(endpoint.clone())
        .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
        .header("SOAPAction", SOAP_ACTION)
        .body(envelope)
        .send()
        .await
        .map_err(connection_error(endpoint))?;

    let response = if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        response
    } else {
        response
            .error_for_status()
            .map_err(connection_error(endpoint))?
    };

    let text = response.text().await.map_err(connection_error(endpoint))?;

    match Response::parse(&text) {
        Ok(Response::Fault(fault)) => Err(AppError::Fault {
            method,
            fault: fault.to_string(),
        }),
        Ok(response) => Ok(response),
        Err(err) => Err(AppError::Protocol {
            method,
            reason: err.to_string(),
        }),
    }
}
