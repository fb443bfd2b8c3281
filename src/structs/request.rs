use std::fmt;

/// Attributes of an authorization request
///
/// Either a resource request (`path` unset) or a non-resource request on `path`.
/// An empty `namespace` is a cluster scoped resource request.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Request {
    pub verb: String,
    pub apiGroup: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subresource: Option<String>,
    /// Name of the object being accessed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Request {
    pub fn resource(verb: &str, apiGroup: &str, resource: &str, namespace: &str) -> Self {
        Request {
            verb: verb.into(),
            apiGroup: apiGroup.into(),
            resource: resource.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn non_resource(verb: &str, path: &str) -> Self {
        Request {
            verb: verb.into(),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_subresource(mut self, subresource: &str) -> Self {
        self.subresource = Some(subresource.into());
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_resource_request(&self) -> bool {
        self.path.is_none()
    }

    /// The `resource/subresource` form rules are written in
    pub fn qualified_resource(&self) -> String {
        match &self.subresource {
            Some(sub) if !sub.is_empty() => format!("{}/{}", self.resource, sub),
            _ => self.resource.clone(),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(path) = &self.path {
            return write!(f, "{} {}", self.verb, path);
        }
        write!(f, "{} {}", self.verb, self.qualified_resource())?;
        if !self.apiGroup.is_empty() {
            write!(f, ".{}", self.apiGroup)?;
        }
        if let Some(n) = &self.name {
            write!(f, " {}", n)?;
        }
        if !self.namespace.is_empty() {
            write!(f, " in {}", self.namespace)?;
        }
        Ok(())
    }
}
