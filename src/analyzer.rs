//! PhishingAnalyzer — orchestrates the check pipeline (spec §4.H)
//!
//! Resolves every store-backed fact the checks need into a
//! [`CheckInputs`] snapshot, then runs the seven checks in the fixed
//! order the spec prescribes, short-circuiting on an allowlisted sender
//! domain.

use chrono::Utc;

use crate::checks::auth_header::AuthHeaderCheck;
use crate::checks::blacklist::{self, BlacklistCheck};
use crate::checks::brand_impersonation::BrandImpersonationCheck;
use crate::checks::ip_url::IPURLCheck;
use crate::checks::link_mismatch::LinkMismatchCheck;
use crate::checks::return_path::ReturnPathCheck;
use crate::checks::suspicious_tld::SuspiciousTLDCheck;
use crate::checks::{CheckInputs, PhishingCheck};
use crate::domain::base_domain;
use crate::email::{AnalysisContext, ParsedEmail};
use crate::errors::AppResult;
use crate::models::{ActionTaken, Verdict};
use crate::store::{AllowlistStore, BlacklistStore, SafeonwebCampaignStore, TrustedLinkDomainStore};

/// Runs the fixed-order check pipeline against a parsed email, consulting
/// the allowlist, blacklist, trusted-link-domain, and campaign stores as
/// needed.
pub struct PhishingAnalyzer {
    allowlist: AllowlistStore,
    blacklist: BlacklistStore,
    trusted_link_domains: TrustedLinkDomainStore,
    campaigns: Option<SafeonwebCampaignStore>,
    checks: Vec<Box<dyn PhishingCheck + Send + Sync>>,
}

impl PhishingAnalyzer {
    pub fn new(
        allowlist: AllowlistStore,
        blacklist: BlacklistStore,
        trusted_link_domains: TrustedLinkDomainStore,
        campaigns: Option<SafeonwebCampaignStore>,
    ) -> Self {
        let checks: Vec<Box<dyn PhishingCheck + Send + Sync>> = vec![
            Box::new(AuthHeaderCheck),
            Box::new(ReturnPathCheck),
            Box::new(BlacklistCheck),
            Box::new(LinkMismatchCheck),
            Box::new(IPURLCheck),
            Box::new(SuspiciousTLDCheck),
            Box::new(BrandImpersonationCheck),
        ];

        Self {
            allowlist,
            blacklist,
            trusted_link_domains,
            campaigns,
            checks,
        }
    }

    /// Analyze a parsed email and build its [`Verdict`]. Never fails: an
    /// errored store lookup is treated as "no match" (fail-open for
    /// suppressions, fail-closed for the allowlist short-circuit — spec
    /// §7).
    pub async fn analyze(&self, email: &ParsedEmail) -> AppResult<Verdict> {
        if !email.from_domain.is_empty() && self.allowlist.is_allowed(&email.from_domain).await.unwrap_or(false) {
            return Ok(Verdict {
                message_id: email.message_id.clone(),
                score: 0,
                reasons: Vec::new(),
                timestamp: Utc::now(),
                action_taken: Some(ActionTaken::None),
                from: email.from.clone(),
                subject: email.subject.clone(),
                received_date: email.received_date,
                imap_uid: None,
            });
        }

        let ctx = AnalysisContext::from(email);
        let inputs = self.resolve_inputs(email, &ctx).await;

        let mut reasons = Vec::new();
        for check in &self.checks {
            reasons.extend(check.analyze(email, &ctx, &inputs));
        }
        let score = reasons.iter().map(|r| r.points).sum();

        Ok(Verdict {
            message_id: email.message_id.clone(),
            score,
            reasons,
            timestamp: Utc::now(),
            action_taken: None,
            from: email.from.clone(),
            subject: email.subject.clone(),
            received_date: email.received_date,
            imap_uid: None,
        })
    }

    async fn resolve_inputs(&self, email: &ParsedEmail, ctx: &AnalysisContext) -> CheckInputs {
        let candidates = blacklist::candidate_domains(email, ctx);
        let blacklisted_domains = self
            .blacklist
            .check_domains(&candidates)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut trusted_link_domains = std::collections::BTreeSet::new();
        for domain in &ctx.link_domains {
            let base = base_domain(domain);
            if self.trusted_link_domains.is_trusted(&base).await.unwrap_or(false) {
                trusted_link_domains.insert(base);
            }
        }

        let active_campaign_brands = match &self.campaigns {
            Some(store) => store.active_brands().await.unwrap_or_default().into_iter().collect(),
            None => std::collections::BTreeSet::new(),
        };

        CheckInputs {
            blacklisted_domains,
            trusted_link_domains,
            active_campaign_brands,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tokio::sync::Mutex;

    use super::*;
    use crate::store::campaign::CampaignBrand;
    use crate::store::{SharedConnection, VerdictStore};

    fn shared_conn() -> SharedConnection {
        Arc::new(Mutex::new(crate::db::open(":memory:").unwrap()))
    }

    fn analyzer(conn: SharedConnection) -> PhishingAnalyzer {
        PhishingAnalyzer::new(
            AllowlistStore::new(conn.clone()),
            BlacklistStore::new(conn.clone()),
            TrustedLinkDomainStore::new(conn.clone()),
            Some(SafeonwebCampaignStore::new(conn, 90)),
        )
    }

    fn email(
        from: &str,
        return_path: Option<&str>,
        auth: Option<&str>,
        html: Option<&str>,
    ) -> ParsedEmail {
        ParsedEmail::new(
            None,
            from.to_owned(),
            return_path.map(str::to_owned),
            auth.map(str::to_owned),
            Some("subject".to_owned()),
            html.map(str::to_owned),
            None,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        )
    }

    #[tokio::test]
    async fn scenario_1_clean_newsletter_scores_zero() {
        let analyzer = analyzer(shared_conn());
        let email = email(
            "user@legitimate.com",
            Some("bounce@legitimate.com"),
            Some("spf=pass; dkim=pass; dmarc=pass"),
            Some(r#"<a href="https://legitimate.com/news">Read</a>"#),
        );

        let verdict = analyzer.analyze(&email).await.unwrap();
        assert_eq!(verdict.score, 0);
        assert!(verdict.reasons.is_empty());
        assert!(matches!(verdict.threat_level(), crate::models::ThreatLevel::Clean));
    }

    #[tokio::test]
    async fn scenario_2_return_path_mismatch_only() {
        let analyzer = analyzer(shared_conn());
        let email = email(
            "support@paypal.com",
            Some("bounce@unrelated.net"),
            Some("spf=pass; dkim=pass; dmarc=pass"),
            None,
        );

        let verdict = analyzer.analyze(&email).await.unwrap();
        assert_eq!(verdict.score, 3);
        assert_eq!(verdict.reasons.len(), 1);
        assert_eq!(verdict.reasons[0].check_name, "ReturnPathCheck");
    }

    #[tokio::test]
    async fn scenario_3_classic_phishing_scores_at_least_six() {
        let analyzer = analyzer(shared_conn());
        let html = r#"<a href="https://evil-site.com/paypal-login">https://paypal.com/verify</a>
                       <a href="http://192.168.1.100/steal">http://192.168.1.100/steal</a>"#;
        let email = email(
            "security@paypal.com",
            Some("x@evil.xyz"),
            Some("spf=fail; dkim=fail; dmarc=fail"),
            Some(html),
        );

        let verdict = analyzer.analyze(&email).await.unwrap();
        assert!(verdict.score >= 6, "expected score >= 6, got {}", verdict.score);
        assert!(matches!(verdict.threat_level(), crate::models::ThreatLevel::Phishing));

        let names: Vec<&str> = verdict.reasons.iter().map(|r| r.check_name.as_str()).collect();
        for expected in ["AuthHeaderCheck", "ReturnPathCheck", "LinkMismatchCheck", "IPURLCheck", "SuspiciousTLDCheck"] {
            assert!(names.contains(&expected), "missing {expected} in {names:?}");
        }
    }

    #[tokio::test]
    async fn scenario_4_brand_impersonation_with_campaign_boost() {
        let conn = shared_conn();
        {
            let campaigns = SafeonwebCampaignStore::new(conn.clone(), 90);
            campaigns
                .insert_brands(&[CampaignBrand {
                    brand: "argenta".to_owned(),
                    published_date: Utc::now(),
                    article_title: "Phishing wave".to_owned(),
                }])
                .await
                .unwrap();
        }
        let analyzer = analyzer(conn);
        let email = email("\"ARGENTA\" <digipass@tradebulls.in>", None, None, None);

        let verdict = analyzer.analyze(&email).await.unwrap();
        assert_eq!(verdict.score, 5);
        assert_eq!(verdict.reasons.len(), 2);
        assert_eq!(
            verdict.reasons[0].reason,
            "Display name ARGENTA does not match sender domain tradebulls.in"
        );
    }

    #[tokio::test]
    async fn scenario_5_esp_passthrough_suppresses_link_mismatch() {
        let analyzer = analyzer(shared_conn());
        let email = email(
            "marketing@example.com",
            None,
            None,
            Some(r#"<a href="https://list-manage.com/track">https://example.com/offer</a>"#),
        );

        let verdict = analyzer.analyze(&email).await.unwrap();
        assert!(!verdict.reasons.iter().any(|r| r.check_name == "LinkMismatchCheck"));
    }

    #[tokio::test]
    async fn allowlisted_sender_short_circuits_to_zero_score() {
        let conn = shared_conn();
        AllowlistStore::new(conn.clone()).add("legitimate.com", true).await.unwrap();
        let analyzer = analyzer(conn);
        let email = email(
            "user@legitimate.com",
            Some("bounce@evil.xyz"),
            Some("spf=fail"),
            None,
        );

        let verdict = analyzer.analyze(&email).await.unwrap();
        assert_eq!(verdict.score, 0);
        assert!(verdict.reasons.is_empty());
    }

    #[tokio::test]
    async fn score_always_equals_sum_of_reason_points() {
        let conn = shared_conn();
        BlacklistStore::new(conn.clone()).add("evil.xyz", "manual").await.unwrap();
        let analyzer = analyzer(conn);
        let email = email("security@paypal.com", Some("x@evil.xyz"), Some("spf=fail"), None);

        let verdict = analyzer.analyze(&email).await.unwrap();
        let sum: u32 = verdict.reasons.iter().map(|r| r.points).sum();
        assert_eq!(verdict.score, sum);

        let store = VerdictStore::new(Arc::new(Mutex::new(crate::db::open(":memory:").unwrap())));
        store.save(&verdict).await.unwrap();
    }
}
