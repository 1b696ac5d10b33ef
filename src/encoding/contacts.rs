use crate::{
    config::{EncodingConfig, RoleConfig},
    dataset::{ResponsibleParty, SensorDescription},
    nc_utils::AttributeList,
};

pub const IOOS_ROLE_PREFIX: &str = "http://mmisw.org/ont/ioos/definition/";
pub const ISO_ROLE_PREFIX: &str = "http://www.isotc211.org/2005/resources/Codelist/gmxCodelists.xml#CI_RoleCode_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ContactRole {
    Publisher,
    Contributor,
}

impl ContactRole {
    /// Role codes to look for, in priority order: the configured one (if
    /// any), then the IOOS vocabulary, then the ISO 19115 code list.
    pub fn role_codes(&self, roles: &RoleConfig) -> Vec<String> {
        let configured = match self {
            ContactRole::Publisher => roles.publisher.as_ref(),
            ContactRole::Contributor => roles.contributor.as_ref(),
        };

        configured.cloned()
            .into_iter()
            .chain([format!("{IOOS_ROLE_PREFIX}{self}"), format!("{ISO_ROLE_PREFIX}{self}")])
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

impl Contact {
    fn from_party(party: &ResponsibleParty) -> Self {
        Self {
            name: party.display_name().map(|s| s.to_string()),
            email: party.email.clone(),
            url: party.url.clone(),
        }
    }

    pub(crate) fn from_provider(config: &EncodingConfig) -> Self {
        let non_empty = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        Self {
            name: non_empty(&config.provider.name),
            email: non_empty(&config.provider.email),
            url: non_empty(&config.provider.site),
        }
    }

    /// ACDD attributes for this contact, e.g. `publisher_name`, `publisher_email`, `publisher_url`.
    pub fn attributes(&self, prefix: &str) -> AttributeList {
        let mut attrs = AttributeList::new();
        if let Some(name) = &self.name {
            attrs.push(format!("{prefix}_name"), name.as_str());
        }
        if let Some(email) = &self.email {
            attrs.push(format!("{prefix}_email"), email.as_str());
        }
        if let Some(url) = &self.url {
            attrs.push(format!("{prefix}_url"), url.as_str());
        }
        attrs
    }
}

/// Find the contact for `role` in a sensor description, falling back to the
/// service provider when there is no description or no matching contact.
pub fn find_contact(role: ContactRole, description: Option<&SensorDescription>, config: &EncodingConfig) -> Contact {
    let found = description.and_then(|desc| {
        role.role_codes(&config.roles)
            .iter()
            .find_map(|code| desc.contacts.iter().find(|c| c.role.eq_ignore_ascii_case(code)))
    });

    match found {
        Some(party) => Contact::from_party(party),
        None => Contact::from_provider(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderMetadata;

    fn party(role: &str, org: &str) -> ResponsibleParty {
        ResponsibleParty {
            role: role.to_string(),
            organization_name: Some(org.to_string()),
            email: Some(format!("info@{org}.org")),
            ..Default::default()
        }
    }

    fn config() -> EncodingConfig {
        EncodingConfig {
            provider: ProviderMetadata {
                name: "Provider".to_string(),
                email: "provider@example.org".to_string(),
                site: "https://example.org".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_role_code_priority() {
        let desc = SensorDescription {
            contacts: vec![
                party(&format!("{ISO_ROLE_PREFIX}publisher"), "iso"),
                party(&format!("{IOOS_ROLE_PREFIX}publisher"), "ioos"),
            ],
            ..Default::default()
        };
        let contact = find_contact(ContactRole::Publisher, Some(&desc), &config());
        assert_eq!(contact.name.as_deref(), Some("ioos"));

        let mut cfg = config();
        cfg.roles.publisher = Some(format!("{ISO_ROLE_PREFIX}publisher"));
        let contact = find_contact(ContactRole::Publisher, Some(&desc), &cfg);
        assert_eq!(contact.name.as_deref(), Some("iso"));
    }

    #[test]
    fn test_fallback_to_provider() {
        let desc = SensorDescription {
            contacts: vec![party(&format!("{IOOS_ROLE_PREFIX}publisher"), "ioos")],
            ..Default::default()
        };
        let contact = find_contact(ContactRole::Contributor, Some(&desc), &config());
        assert_eq!(contact.name.as_deref(), Some("Provider"));
        assert_eq!(contact.url.as_deref(), Some("https://example.org"));

        let contact = find_contact(ContactRole::Publisher, None, &config());
        assert_eq!(contact.email.as_deref(), Some("provider@example.org"));
    }

    #[test]
    fn test_contact_attributes() {
        let attrs = find_contact(ContactRole::Publisher, None, &config()).attributes("publisher");
        assert_eq!(attrs.names().collect::<Vec<_>>(), vec!["publisher_name", "publisher_email", "publisher_url"]);

        let attrs = find_contact(ContactRole::Publisher, None, &EncodingConfig::default()).attributes("publisher");
        assert!(attrs.is_empty());
    }
}
