// system-tests/tests/suites/authorization.rs
// ============================================================================
// Module: Authorization Tests
// Description: Standard and admin tokens against the fake target.
// Purpose: Validate minted tokens and the status taxonomy end to end.
// Dependencies: system-tests helpers, capi-harness
// ============================================================================

//! Authorization tests driven by harness-minted tokens.

use capi_harness::ApplicationError;
use capi_harness::Harness;
use capi_harness::IdentityIssuer;
use capi_harness::TargetResponse;
use capi_harness::TrustConfig;
use capi_harness_config::ConfigPath;
use capi_harness_config::ConfigValue;
use capi_harness_stubs::IdentityStubOptions;
use capi_harness_stubs::spawn_identity_stub;
use serde_json::Value;
use serde_json::json;
use system_tests::fake_target::Organization;

use crate::helpers::target::dial;
use crate::helpers::target::fake_target_options;

fn expect_error<T>(
    response: &TargetResponse<T>,
    expected: ApplicationError,
    step: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match response.error() {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(format!("{step}: expected {expected}, got {actual:?}").into()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn requests_without_valid_tokens_are_unauthenticated()
-> Result<(), Box<dyn std::error::Error>> {
    let harness = dial().await?;

    let anonymous = harness.client().get::<Value>("/v3/organizations", "").await?;
    expect_error(&anonymous, ApplicationError::Unauthenticated, "anonymous list")?;

    let foreign = IdentityIssuer::new(TrustConfig::new("not-the-secret", "http://localhost:6789"));
    let forged = foreign.issue_token("intruder", true)?;
    let rejected = harness.client().get::<Value>("/v3/organizations", &forged).await?;
    expect_error(&rejected, ApplicationError::Unauthenticated, "foreign key list")?;

    harness.kill()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_scope_gates_writes() -> Result<(), Box<dyn std::error::Error>> {
    let harness = dial().await?;
    let client = harness.client();
    let user = harness.actor("user", false)?;
    let admin = harness.actor("admin", true)?;
    let body = json!({ "name": "org-one" });

    let listed = client.get::<Value>("/v3/organizations", &user.access_token).await?;
    if listed.status().as_u16() != 200 {
        return Err(format!("standard list returned {}", listed.status()).into());
    }

    let denied =
        client.post::<_, Organization>("/v3/organizations", &user.access_token, &body).await?;
    expect_error(&denied, ApplicationError::Forbidden, "standard create")?;

    let created =
        client.post::<_, Organization>("/v3/organizations", &admin.access_token, &body).await?;
    let org = created.expect_status(201)?.ok_or("created org has no body")?;
    if org.name != "org-one" {
        return Err(format!("created org has name {}", org.name).into());
    }

    let duplicate =
        client.post::<_, Organization>("/v3/organizations", &admin.access_token, &body).await?;
    expect_error(&duplicate, ApplicationError::UnprocessableEntity, "duplicate create")?;

    let path = format!("/v3/organizations/{}", org.guid);
    let fetched = client.get::<Organization>(&path, &user.access_token).await?;
    if fetched.into_body().as_ref() != Some(&org) {
        return Err("fetched org differs from created org".into());
    }

    let denied_delete = client.delete(&path, &user.access_token).await?;
    expect_error(&denied_delete, ApplicationError::Forbidden, "standard delete")?;
    client.delete(&path, &admin.access_token).await?.expect_status(204)?;
    let missing = client.get::<Organization>(&path, &admin.access_token).await?;
    expect_error(&missing, ApplicationError::NotFound, "get after delete")?;

    harness.kill()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_name_is_a_bad_request() -> Result<(), Box<dyn std::error::Error>> {
    let harness = dial().await?;
    let admin = harness.actor("admin", true)?;
    let response = harness
        .client()
        .post::<_, Value>("/v3/organizations", &admin.access_token, &json!({ "name": " " }))
        .await?;
    expect_error(&response, ApplicationError::BadRequest, "blank create")?;
    harness.kill()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn identity_provider_url_keeps_minted_tokens_trusted()
-> Result<(), Box<dyn std::error::Error>> {
    let trust = TrustConfig::default();
    let provider = spawn_identity_stub(IdentityStubOptions::new(trust.issuer.clone()))?;
    let harness = Harness::dial(
        fake_target_options().with_trust(trust.clone()).with_identity_provider_url(provider.base_url()),
    )
    .await?;

    let document = harness.config().document();
    let expected = [
        ("uaa.url", ConfigValue::from(trust.issuer.as_str())),
        ("uaa.internal_url", ConfigValue::from(provider.base_url())),
    ];
    for (path, value) in expected {
        let actual = document.get(&ConfigPath::parse(path)?);
        if actual != Some(&value) {
            return Err(format!("{path}: expected {value:?}, got {actual:?}").into());
        }
    }

    let user = harness.actor("user", false)?;
    let listed = harness.client().get::<Value>("/v3/organizations", &user.access_token).await?;
    if listed.status().as_u16() != 200 {
        return Err(format!("minted token rejected with {}", listed.status()).into());
    }

    harness.kill()?;
    provider.shutdown();
    Ok(())
}
