// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core OPC UA types: node identities, security descriptors, data types,
//! and client configuration.
//!
//! This module provides the vocabulary the rest of the engine speaks:
//!
//! - [`NodeId`] / [`NodeIdentifier`] — address-space identities with the
//!   canonical `ns=<n>;i=/s=/g=/b=<v>` string form
//! - [`NodeClass`] — the Object/Variable distinction driving browse and
//!   navigation behavior
//! - [`SecurityPolicy`] / [`SecurityMode`] — the negotiated security pair
//! - [`UaDataType`] — built-in data types the value codec understands
//! - [`ClientConfig`] — fixed protocol defaults with a builder

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClientError, ConfigError};

// ============================================================================
// Node identity
// ============================================================================

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeIdentifier {
    /// Numeric identifier (`i=1001`).
    Numeric(u32),
    /// String identifier (`s=Machine.Speed`).
    String(String),
    /// GUID identifier (`g=550e8400-...`).
    Guid(Uuid),
    /// Opaque byte identifier, base64 in string form (`b=SGVsbG8=`).
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={v}"),
            Self::String(v) => write!(f, "s={v}"),
            Self::Guid(v) => write!(f, "g={v}"),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

/// An OPC UA node identity: namespace index plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index within the server's namespace table.
    pub namespace: u16,
    /// The identifier within that namespace.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Root folder (`ns=0;i=84`).
    pub const ROOT_FOLDER: u32 = 84;
    /// Objects folder (`ns=0;i=85`) — the browse tree root.
    pub const OBJECTS_FOLDER: u32 = 85;
    /// Types folder (`ns=0;i=86`).
    pub const TYPES_FOLDER: u32 = 86;

    /// Creates a numeric node id.
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self { namespace, identifier: NodeIdentifier::Numeric(value) }
    }

    /// Creates a string node id.
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self { namespace, identifier: NodeIdentifier::String(value.into()) }
    }

    /// Creates a GUID node id.
    pub fn guid(namespace: u16, value: Uuid) -> Self {
        Self { namespace, identifier: NodeIdentifier::Guid(value) }
    }

    /// Creates an opaque node id.
    pub fn opaque(namespace: u16, value: Vec<u8>) -> Self {
        Self { namespace, identifier: NodeIdentifier::Opaque(value) }
    }

    /// The objects folder, root of the hierarchical browse tree.
    pub fn objects_folder() -> Self {
        Self::numeric(0, Self::OBJECTS_FOLDER)
    }

    /// Returns the canonical OPC UA string form, e.g. `ns=2;s=Machine.Speed`.
    ///
    /// Namespace 0 is rendered without the `ns=` prefix.
    pub fn to_opc_string(&self) -> String {
        if self.namespace == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace, self.identifier)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = ClientError;

    /// Parses a node id from OPC UA string format.
    ///
    /// Supported forms:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64)
    /// - `i=85`, `s=MyNode` (namespace 0 shorthand)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace, rest) = if let Some(with_ns) = s.strip_prefix("ns=") {
            let Some((ns_str, rest)) = with_ns.split_once(';') else {
                return Err(ClientError::config(ConfigError::invalid_node_id(
                    s,
                    "missing identifier after namespace",
                )));
            };
            let ns: u16 = ns_str.parse().map_err(|_| {
                ClientError::config(ConfigError::invalid_node_id(s, "invalid namespace index"))
            })?;
            (ns, rest)
        } else {
            (0, s)
        };

        let identifier = if let Some(id) = rest.strip_prefix("i=") {
            let value: u32 = id.parse().map_err(|_| {
                ClientError::config(ConfigError::invalid_node_id(s, "invalid numeric identifier"))
            })?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = rest.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = rest.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id).map_err(|e| {
                ClientError::config(ConfigError::invalid_node_id(s, format!("invalid GUID: {e}")))
            })?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = rest.strip_prefix("b=") {
            let bytes = BASE64.decode(id).map_err(|e| {
                ClientError::config(ConfigError::invalid_node_id(s, format!("invalid base64: {e}")))
            })?;
            NodeIdentifier::Opaque(bytes)
        } else {
            return Err(ClientError::config(ConfigError::invalid_node_id(
                s,
                "identifier must start with i=, s=, g= or b=",
            )));
        };

        Ok(Self { namespace, identifier })
    }
}

// ============================================================================
// Node class
// ============================================================================

/// Class of an address-space node. Browsing is restricted to Objects
/// (containers, recursed into) and Variables (value holders, leaves).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    /// Container node; may have hierarchical children.
    Object,
    /// Value-holding node; never has children in this engine's model.
    Variable,
    /// Any other class (method, view, types). Carried but not browsed into.
    Other(u32),
}

impl NodeClass {
    /// Object node-class bit.
    pub const OBJECT_BIT: u32 = 0x01;
    /// Variable node-class bit.
    pub const VARIABLE_BIT: u32 = 0x02;
    /// Browse mask covering Object and Variable.
    pub const BROWSE_MASK: u32 = Self::OBJECT_BIT | Self::VARIABLE_BIT;

    /// Maps a wire node-class value to the enum.
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            Self::OBJECT_BIT => Self::Object,
            Self::VARIABLE_BIT => Self::Variable,
            other => Self::Other(other),
        }
    }

    /// The wire node-class value.
    pub fn bits(&self) -> u32 {
        match self {
            Self::Object => Self::OBJECT_BIT,
            Self::Variable => Self::VARIABLE_BIT,
            Self::Other(bits) => *bits,
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "Object"),
            Self::Variable => write!(f, "Variable"),
            Self::Other(bits) => write!(f, "Other({bits})"),
        }
    }
}

// ============================================================================
// Security descriptors
// ============================================================================

/// Message security mode: whether messages are unprotected, signed, or
/// signed and encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityMode {
    /// No message protection.
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Wire value of the mode.
    pub fn value(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Sign => 2,
            Self::SignAndEncrypt => 3,
        }
    }

    /// Returns `true` if messages carry a signature.
    pub fn is_signed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sign => write!(f, "Sign"),
            Self::SignAndEncrypt => write!(f, "SignAndEncrypt"),
        }
    }
}

impl FromStr for SecurityMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "None" | "none" => Ok(Self::None),
            "Sign" | "sign" => Ok(Self::Sign),
            "SignAndEncrypt" | "signandencrypt" | "sign_and_encrypt" => Ok(Self::SignAndEncrypt),
            other => Err(ClientError::config(ConfigError::UnknownSecurity {
                input: other.to_string(),
            })),
        }
    }
}

/// Security policy: the cryptographic suite protecting the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityPolicy {
    /// No security.
    None,
    /// Basic256Sha256 suite (RSA-2048+, SHA-256).
    Basic256Sha256,
    /// AES-128 with SHA-256 and RSA-OAEP.
    Aes128Sha256RsaOaep,
    /// AES-256 with SHA-256 and RSA-PSS.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    const URI_PREFIX: &'static str = "http://opcfoundation.org/UA/SecurityPolicy#";

    /// Returns the policy URI advertised in endpoint descriptions.
    pub fn uri(&self) -> String {
        let suffix = match self {
            Self::None => "None",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128_Sha256_RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256_Sha256_RsaPss",
        };
        format!("{}{}", Self::URI_PREFIX, suffix)
    }

    /// Maps a policy URI back to the enum.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let suffix = uri.strip_prefix(Self::URI_PREFIX)?;
        match suffix {
            "None" => Some(Self::None),
            "Basic256Sha256" => Some(Self::Basic256Sha256),
            "Aes128_Sha256_RsaOaep" => Some(Self::Aes128Sha256RsaOaep),
            "Aes256_Sha256_RsaPss" => Some(Self::Aes256Sha256RsaPss),
            _ => None,
        }
    }

    /// Returns `true` if this policy requires a client certificate.
    pub fn requires_certificate(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic256Sha256 => write!(f, "Basic256Sha256"),
            Self::Aes128Sha256RsaOaep => write!(f, "Aes128Sha256RsaOaep"),
            Self::Aes256Sha256RsaPss => write!(f, "Aes256Sha256RsaPss"),
        }
    }
}

impl FromStr for SecurityPolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }
        match s {
            "None" | "none" => Ok(Self::None),
            "Basic256Sha256" => Ok(Self::Basic256Sha256),
            "Aes128Sha256RsaOaep" => Ok(Self::Aes128Sha256RsaOaep),
            "Aes256Sha256RsaPss" => Ok(Self::Aes256Sha256RsaPss),
            other => Err(ClientError::config(ConfigError::UnknownSecurity {
                input: other.to_string(),
            })),
        }
    }
}

// ============================================================================
// Built-in data types
// ============================================================================

/// Built-in data types the value codec can encode from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UaDataType {
    /// Boolean (`true`/`false`).
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Calendar timestamp.
    DateTime,
}

impl UaDataType {
    /// The built-in type id used as the data-type node identifier in
    /// namespace 0.
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
        }
    }

    /// Maps a namespace-0 built-in type id back to the enum.
    pub fn from_type_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Boolean),
            2 => Some(Self::SByte),
            3 => Some(Self::Byte),
            4 => Some(Self::Int16),
            5 => Some(Self::UInt16),
            6 => Some(Self::Int32),
            7 => Some(Self::UInt32),
            8 => Some(Self::Int64),
            9 => Some(Self::UInt64),
            10 => Some(Self::Float),
            11 => Some(Self::Double),
            12 => Some(Self::String),
            13 => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Display name of the type as servers render it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
        }
    }

    /// Maps a display name (case-insensitive) back to the enum.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(Self::Boolean),
            "sbyte" => Some(Self::SByte),
            "byte" => Some(Self::Byte),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::UInt16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::UInt32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::UInt64),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "datetime" => Some(Self::DateTime),
            _ => None,
        }
    }
}

impl fmt::Display for UaDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Client configuration
// ============================================================================

fn default_application_name() -> String {
    "uascope".to_string()
}

fn default_application_uri() -> String {
    "urn:uascope:client".to_string()
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_channel_lifetime() -> Duration {
    Duration::from_secs(300)
}

fn default_token_lifetime() -> Duration {
    Duration::from_secs(3600)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_discovery_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_certificate_dir() -> PathBuf {
    PathBuf::from("pki/own")
}

fn default_certificate_subject() -> String {
    "CN=uascope client".to_string()
}

/// Client engine configuration.
///
/// The timeout values are fixed protocol defaults; they are configuration
/// constants rather than runtime inputs, so the builder exists mainly for
/// tests and embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name presented during session creation.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI embedded in the client certificate.
    #[serde(default = "default_application_uri")]
    pub application_uri: String,

    /// Per-operation service timeout.
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Secure channel lifetime.
    #[serde(default = "default_channel_lifetime", with = "humantime_serde")]
    pub channel_lifetime: Duration,

    /// Security token lifetime.
    #[serde(default = "default_token_lifetime", with = "humantime_serde")]
    pub token_lifetime: Duration,

    /// Session timeout negotiated at creation.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Bound on the endpoint discovery call.
    #[serde(default = "default_discovery_timeout", with = "humantime_serde")]
    pub discovery_timeout: Duration,

    /// Directory holding the client certificate and private key.
    #[serde(default = "default_certificate_dir")]
    pub certificate_dir: PathBuf,

    /// Subject distinguished name for generated certificates.
    #[serde(default = "default_certificate_subject")]
    pub certificate_subject: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            application_uri: default_application_uri(),
            operation_timeout: default_operation_timeout(),
            channel_lifetime: default_channel_lifetime(),
            token_lifetime: default_token_lifetime(),
            session_timeout: default_session_timeout(),
            discovery_timeout: default_discovery_timeout(),
            certificate_dir: default_certificate_dir(),
            certificate_subject: default_certificate_subject(),
        }
    }
}

impl ClientConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder for customizing the configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.application_name.is_empty() {
            return Err(ClientError::config(ConfigError::invalid_value(
                "application_name",
                "must not be empty",
            )));
        }
        if self.operation_timeout.is_zero() {
            return Err(ClientError::config(ConfigError::invalid_value(
                "operation_timeout",
                "must be positive",
            )));
        }
        if self.discovery_timeout.is_zero() {
            return Err(ClientError::config(ConfigError::invalid_value(
                "discovery_timeout",
                "must be positive",
            )));
        }
        if self.session_timeout.is_zero() {
            return Err(ClientError::config(ConfigError::invalid_value(
                "session_timeout",
                "must be positive",
            )));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default, Clone)]
pub struct ClientConfigBuilder {
    application_name: Option<String>,
    application_uri: Option<String>,
    operation_timeout: Option<Duration>,
    discovery_timeout: Option<Duration>,
    session_timeout: Option<Duration>,
    certificate_dir: Option<PathBuf>,
    certificate_subject: Option<String>,
}

impl ClientConfigBuilder {
    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.application_uri = Some(uri.into());
        self
    }

    /// Sets the per-operation timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets the discovery timeout.
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = Some(timeout);
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the certificate directory.
    pub fn certificate_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.certificate_dir = Some(dir.into());
        self
    }

    /// Sets the certificate subject DN.
    pub fn certificate_subject(mut self, subject: impl Into<String>) -> Self {
        self.certificate_subject = Some(subject.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            application_name: self.application_name.unwrap_or(defaults.application_name),
            application_uri: self.application_uri.unwrap_or(defaults.application_uri),
            operation_timeout: self.operation_timeout.unwrap_or(defaults.operation_timeout),
            channel_lifetime: defaults.channel_lifetime,
            token_lifetime: defaults.token_lifetime,
            session_timeout: self.session_timeout.unwrap_or(defaults.session_timeout),
            discovery_timeout: self.discovery_timeout.unwrap_or(defaults.discovery_timeout),
            certificate_dir: self.certificate_dir.unwrap_or(defaults.certificate_dir),
            certificate_subject: self.certificate_subject.unwrap_or(defaults.certificate_subject),
        };
        config.validate()?;
        Ok(config)
    }
}
