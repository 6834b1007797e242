//! Wire types for the vim25 SOAP API. Only the fields this tool reads are declared; the
//! deserializer skips everything else the server sends.
use std::fmt;

use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "Body", bound(deserialize = "for<'a> T: Deserialize<'a>"))]
    pub body: Body<T>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Body<T> {
    #[serde(rename = "$value", bound(deserialize = "for<'a> T: Deserialize<'a>"))]
    pub content: T,
}

/// The single child of a SOAP response body.
#[derive(Deserialize, Debug)]
pub(crate) enum Response {
    RetrieveServiceContentResponse { returnval: ServiceContent },
    LoginResponse { returnval: UserSession },
    RetrievePropertiesExResponse {
        #[serde(default)]
        returnval: Option<RetrieveResult>,
    },
    LogoutResponse {},
    Fault(SoapFault),
}

impl Response {
    pub(crate) fn parse(xml: &str) -> Result<Self, quick_xml::de::DeError> {
        let envelope: Envelope<Self> = quick_xml::de::from_str(xml)?;
        Ok(envelope.body.content)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::RetrieveServiceContentResponse { .. } => "RetrieveServiceContentResponse",
            Self::LoginResponse { .. } => "LoginResponse",
            Self::RetrievePropertiesExResponse { .. } => "RetrievePropertiesExResponse",
            Self::LogoutResponse {} => "LogoutResponse",
            Self::Fault(_) => "Fault",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SoapFault {
    #[serde(default)]
    pub faultcode: String,
    #[serde(default)]
    pub faultstring: String,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.faultstring.is_empty() {
            write!(f, "{}", self.faultcode)
        } else {
            write!(f, "{}", self.faultstring)
        }
    }
}

/// Reference to a server-side managed object, e.g. `<perfManager type="PerformanceManager">PerfMgr</perfManager>`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManagedObjectReference {
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "$text")]
    pub value: String,
}

impl ManagedObjectReference {
    pub(crate) fn new(kind: &str, value: &str) -> Self {
        Self {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }

    /// Serialize as a vim25 element named `tag`.
    pub(crate) fn to_xml(&self, tag: &str) -> String {
        format!(
            "<{tag} type=\"{}\">{}</{tag}>",
            quick_xml::escape::escape(self.kind.as_str()),
            quick_xml::escape::escape(self.value.as_str())
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceContent {
    pub about: AboutInfo,
    pub property_collector: ManagedObjectReference,
    pub session_manager: Option<ManagedObjectReference>,
    pub perf_manager: Option<ManagedObjectReference>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AboutInfo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub api_type: String,
    #[serde(default)]
    pub api_version: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserSession {
    #[serde(default)]
    pub user_name: String,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct RetrieveResult {
    #[serde(default)]
    pub objects: Vec<ObjectContent>,
}

/// Properties of one managed object as returned by the property collector.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectContent {
    pub obj: ManagedObjectReference,
    #[serde(default)]
    pub prop_set: Vec<DynamicProperty>,
    #[serde(default)]
    pub missing_set: Vec<MissingProperty>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct DynamicProperty {
    pub name: String,
    #[serde(default)]
    pub val: PropertyValue,
}

/// A property value. Arrays of the element types below are picked up, anything else is skipped.
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct PropertyValue {
    #[serde(rename = "PerfCounterInfo", default)]
    pub perf_counters: Vec<PerfCounterInfo>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct MissingProperty {
    pub path: String,
}

/// One performance counter definition.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PerfCounterInfo {
    pub key: i32,
    pub name_info: ElementDescription,
    pub group_info: ElementDescription,
    /// average, maximum, minimum, latest, summation or none.
    pub rollup_type: String,
    pub level: Option<i32>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ElementDescription {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key: String,
}
