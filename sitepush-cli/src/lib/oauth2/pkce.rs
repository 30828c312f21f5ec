use std::net::SocketAddr;

use oauth2::{
    basic::BasicTokenResponse, AuthorizationCode, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope,
};
use tokio::{io, net};

use super::{server, Client};
use crate::{error, uri};

impl Client {
    /// Authorization code flow with PKCE, redirecting to a one-shot loopback server
    pub(super) async fn fetch_token_pkce(
        &self,
        scopes: Vec<Scope>,
    ) -> sitepush::Result<BasicTokenResponse> {
        log::info!("Starting PKCE flow for scopes {scopes:?}");

        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = net::TcpListener::bind(&addr).await?;
        let redirect_addr = listener.local_addr()?;

        let redirect_url =
            RedirectUrl::new(format!("http://{redirect_addr}")).map_err(error::bug)?;
        let redirect_url = std::borrow::Cow::Borrowed(&redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .inner
            .oauth2
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(redirect_url.clone())
            .add_scopes(scopes)
            .set_pkce_challenge(pkce_challenge)
            .url();

        eprintln!("Opening a browser for authorization. If none shows up, visit:\n{auth_url}");
        let browser_url = auth_url.to_string();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = webbrowser::open(&browser_url) {
                log::warn!("Could not open browser: {err}");
            }
        });

        log::trace!("starting local server on {redirect_addr}");
        let (socket, addr) = listener.accept().await?;

        log::trace!("incoming request from {addr:#?}");
        let (reader, writer) = io::split(socket);
        let reader = io::BufReader::new(reader);
        let writer = io::BufWriter::new(writer);
        let req = server::read_request_head(reader)
            .await
            .map_err(error::auth)?;
        let query = uri::QueryMap::parse(req.uri().query());

        if let Some(err) = query.get("error") {
            let resp = server::text_response(403, "Authorization was denied.")?;
            server::write_response(resp, writer).await?;
            sitepush::auth_bail!("Authorization denied: {err}");
        }

        let code = query
            .get("code")
            .map(str::to_string)
            .map(AuthorizationCode::new)
            .ok_or_else(|| {
                sitepush::auth_error!(
                    "'code' was not returned by {}",
                    self.inner.oauth2.auth_url().as_str()
                )
            })?;
        let state = query
            .get("state")
            .map(str::to_string)
            .map(CsrfToken::new)
            .ok_or_else(|| {
                sitepush::auth_error!(
                    "'state' was not returned by {}",
                    self.inner.oauth2.auth_url().as_str()
                )
            })?;

        if state.secret() != csrf_state.secret() {
            log::error!("Failed PKCE challenge");
            let resp = server::text_response(401, "Could not verify the CSRF token :-(")?;
            server::write_response(resp, writer).await?;
            sitepush::auth_bail!("Could not verify the CSRF token");
        }

        log::trace!("exchanging code for token");

        let token_response = self
            .inner
            .oauth2
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .set_redirect_uri(redirect_url)
            .request_async(|req| async { self.http(req).await })
            .await
            .map_err(error::auth)?;

        let resp = server::text_response(200, "All good, you can close this window ;-)")?;
        server::write_response(resp, writer).await?;

        Ok(token_response)
    }
}
