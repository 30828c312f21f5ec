use std::sync::Arc;

use async_stream::try_stream;
use futures::prelude::*;
use sitepush::{
    id::{Id, IdBuf},
    path::FsPath,
    Kind, RemoteEntry,
};

use crate::{oauth2::GetToken, PersistCache};

pub const FOLDER_MIMETYPE: &str = "application/vnd.google-apps.folder";

#[derive(Clone)]
pub struct GoogleDrive<A> {
    client: reqwest::Client,
    auth: Arc<A>,
    base_url: &'static str,
    upload_base_url: &'static str,
    user_agent: String,

    user: api::User,
    quota: api::Quota,
}

impl<A> GoogleDrive<A>
where
    A: GetToken,
{
    pub async fn new(auth: A, client: reqwest::Client) -> sitepush::Result<Self> {
        let user_agent = format!("sitepush/{}", env!("CARGO_PKG_VERSION"));
        let mut drive = Self {
            auth: Arc::new(auth),
            client,
            base_url: "https://www.googleapis.com/drive/v3",
            upload_base_url: "https://www.googleapis.com/upload/drive/v3",
            user_agent,
            user: api::User::default(),
            quota: api::Quota::default(),
        };

        let about = drive.about_get().await?;
        drive.user = about.user;
        drive.quota = about.storage_quota;

        log::info!(
            "Access granted to Drive of {}{}",
            drive.user.display_name,
            drive
                .user
                .email_address
                .as_ref()
                .map(|em| format!(" <{em}>"))
                .unwrap_or_default(),
        );
        if let (Some(usage), Some(limit)) = (drive.quota.usage, drive.quota.limit) {
            use byte_unit::{Byte, UnitType};
            if let (Some(usage), Some(limit)) = (Byte::from_i64(usage), Byte::from_i64(limit)) {
                let usage = usage.get_appropriate_unit(UnitType::Binary);
                let limit = limit.get_appropriate_unit(UnitType::Binary);
                log::info!("Usage {usage:#.2} / {limit:#.3}");
            }
        }

        Ok(drive)
    }
}

impl<A> super::RootFolder for GoogleDrive<A>
where
    A: GetToken,
{
    async fn root_id(&self) -> sitepush::Result<IdBuf> {
        let file = self.files_get(Id::new("root"), "id").await?;
        file.id
            .ok_or_else(|| sitepush::api_error!("No ID returned for the root folder"))
    }
}

impl<A> super::ListChildren for GoogleDrive<A>
where
    A: GetToken,
{
    async fn list_children(&self, parent_id: &Id, kind: Kind) -> sitepush::Result<Vec<RemoteEntry>> {
        log::trace!("listing {kind} children of {parent_id}");
        let q = children_query(parent_id, kind);

        let entries = try_stream! {
            let mut next_page_token = None;
            loop {
                let file_list = self.files_list(&q, next_page_token).await?;
                next_page_token = file_list.next_page_token;
                for f in file_list.files.unwrap_or_default() {
                    yield map_file(f)?;
                }
                if next_page_token.is_none() {
                    break;
                }
            }
        };
        entries.try_collect().await
    }
}

impl<A> super::GetMetadata for GoogleDrive<A>
where
    A: GetToken,
{
    async fn get_metadata(&self, id: &Id) -> sitepush::Result<RemoteEntry> {
        log::trace!("getting metadata of {id}");
        let file = self.files_get(id, api::FILE_FIELDS).await?;
        map_file(file)
    }
}

impl<A> super::MkDir for GoogleDrive<A>
where
    A: GetToken,
{
    async fn mkdir(&self, parent_id: &Id, name: &str) -> sitepush::Result<IdBuf> {
        log::info!("creating folder {name} in folder {parent_id}");
        let f = api::File {
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIMETYPE.to_string()),
            parents: Some(vec![parent_id.to_owned()]),
            ..Default::default()
        };
        let res = self.files_create(&f).await?;
        res.id
            .ok_or_else(|| sitepush::api_error!("No ID returned for folder {name}"))
    }
}

impl<A> super::UploadFile for GoogleDrive<A>
where
    A: GetToken,
{
    async fn upload_file(&self, parent_id: &Id, name: &str, local: &FsPath) -> sitepush::Result<IdBuf> {
        let size = tokio::fs::metadata(local)
            .await
            .map_err(|err| sitepush::io_error!("Could not stat {local}: {err}"))?
            .len();
        let mime_type = mime_guess::from_path(local)
            .first_or_octet_stream()
            .to_string();
        log::info!("uploading {local} ({size} bytes, {mime_type})");

        let f = api::File {
            name: Some(name.to_string()),
            mime_type: Some(mime_type),
            parents: Some(vec![parent_id.to_owned()]),
            ..Default::default()
        };
        let data = tokio::fs::File::open(local)
            .await
            .map_err(|err| sitepush::io_error!("Could not open {local}: {err}"))?;
        let res = self.files_upload(&f, size, data, local).await?;
        res.id
            .ok_or_else(|| sitepush::api_error!("No ID returned for file {name}"))
    }
}

impl<A> super::Delete for GoogleDrive<A>
where
    A: GetToken,
{
    async fn delete(&self, id: &Id) -> sitepush::Result<()> {
        log::info!("deleting {id}");
        self.files_delete(id).await
    }
}

impl<A> super::GrantPublicRead for GoogleDrive<A>
where
    A: GetToken,
{
    async fn grant_public_read(&self, id: &Id) -> sitepush::Result<()> {
        let permissions = self.permissions_list(id).await?;
        if permissions.iter().any(api::Permission::is_public_read) {
            log::debug!("{id} is already public");
            return Ok(());
        }
        log::info!("granting public read access to {id}");
        self.permissions_create(id, &api::Permission::public_read())
            .await
    }
}

impl<A> PersistCache for GoogleDrive<A>
where
    A: PersistCache + Send + Sync,
{
    async fn persist_cache(&self) -> anyhow::Result<()> {
        self.auth.persist_cache().await
    }
}

/// Quotes a literal for use in a Drive search query
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn children_query(parent_id: &Id, kind: Kind) -> String {
    let op = match kind {
        Kind::Folder => "=",
        Kind::File => "!=",
    };
    format!(
        "{} in parents and trashed = false and mimeType {op} {}",
        quote(parent_id.as_str()),
        quote(FOLDER_MIMETYPE)
    )
}

fn map_file(f: api::File) -> sitepush::Result<RemoteEntry> {
    let id = f
        .id
        .ok_or_else(|| sitepush::api_error!("Expected to receive id from Google"))?;
    let name = f
        .name
        .ok_or_else(|| sitepush::api_error!("Expected to receive name from Google for {id}"))?;
    let kind = if f.mime_type.as_deref() == Some(FOLDER_MIMETYPE) {
        Kind::Folder
    } else {
        Kind::File
    };
    Ok(RemoteEntry {
        id,
        name,
        kind,
        content_hash: f.md5_checksum,
        trashed: f.trashed.unwrap_or(false),
        web_link: f.web_view_link,
    })
}

mod api {
    use reqwest::{header, StatusCode};
    use serde::{Deserialize, Serialize};
    use sitepush::{id::Id, id::IdBuf, path::FsPath};
    use tokio::io;

    use super::utils::{check_response, num_from_str};
    use crate::{error, oauth2::GetToken};

    pub const SCOPE: &str = "https://www.googleapis.com/auth/drive";

    #[derive(Default, Clone, Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct User {
        pub display_name: String,
        pub email_address: Option<String>,
    }

    #[derive(Default, Clone, Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Quota {
        #[serde(default, deserialize_with = "num_from_str")]
        pub limit: Option<i64>,
        #[serde(default, deserialize_with = "num_from_str")]
        pub usage: Option<i64>,
    }

    const ABOUT_FIELDS: &str = "kind,storageQuota,user";

    #[derive(Default, Clone, Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct About {
        kind: String,
        pub storage_quota: Quota,
        pub user: User,
    }

    pub const FILE_FIELDS: &str = "id,name,mimeType,md5Checksum,trashed,webViewLink";
    const LIST_FIELDS: &str = "id,name,mimeType,md5Checksum,trashed";

    #[derive(Default, Clone, Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct File {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub id: Option<IdBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub parents: Option<Vec<IdBuf>>,
        #[serde(skip_serializing)]
        pub md5_checksum: Option<String>,
        #[serde(skip_serializing)]
        pub trashed: Option<bool>,
        #[serde(skip_serializing)]
        pub web_view_link: Option<String>,
    }

    #[derive(Default, Clone, Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FileList {
        pub files: Option<Vec<File>>,
        pub next_page_token: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Permission {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
        #[serde(rename = "type")]
        pub typ: String,
        pub role: String,
    }

    impl Permission {
        pub fn public_read() -> Self {
            Permission {
                id: None,
                typ: "anyone".to_string(),
                role: "reader".to_string(),
            }
        }

        /// Whether anyone can at least read through this permission
        pub fn is_public_read(&self) -> bool {
            self.typ == "anyone"
                && matches!(
                    self.role.as_str(),
                    "reader" | "commenter" | "writer" | "fileOrganizer" | "organizer" | "owner"
                )
        }
    }

    #[derive(Default, Clone, Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PermissionList {
        pub permissions: Option<Vec<Permission>>,
        pub next_page_token: Option<String>,
    }

    #[derive(Debug, Clone)]
    pub struct UploadParams<'a> {
        pub size: u64,
        pub mime_type: Option<&'a str>,
        pub fields: &'a str,
    }

    impl<'a> UploadParams<'a> {
        pub fn query_params(&'a self) -> Vec<(&'static str, &'a str)> {
            vec![("uploadType", "resumable"), ("fields", self.fields)]
        }
    }

    /// Chunks must be a multiple of 256 KiB, except the last one
    pub const UPLOAD_CHUNK_SZ: u64 = 8 * 256 * 1024;

    /// Size of the next chunk to send, never past the announced length
    pub fn chunk_len(sent: u64, data_len: u64) -> u64 {
        UPLOAD_CHUNK_SZ.min(data_len.saturating_sub(sent))
    }

    impl<A> super::GoogleDrive<A>
    where
        A: GetToken,
    {
        pub async fn about_get(&self) -> sitepush::Result<About> {
            let path = "/about";
            let query_params = vec![("fields", ABOUT_FIELDS)];

            let res = self.get_query(path, query_params).await?;
            let res = check_response("GET", path, res).await?;
            let about: About = res.json().await.map_err(error::api)?;
            if about.kind != "drive#about" {
                sitepush::api_bail!("/about returned wrong kind!");
            }
            Ok(about)
        }

        pub async fn files_list(
            &self,
            q: &str,
            page_token: Option<String>,
        ) -> sitepush::Result<FileList> {
            let path = "/files";

            let mut query_params = vec![
                ("q", q.to_string()),
                ("fields", format!("nextPageToken,files({LIST_FIELDS})")),
                ("pageSize", "1000".to_string()),
                ("alt", "json".into()),
            ];
            if let Some(page_token) = page_token {
                query_params.push(("pageToken", page_token));
            }

            let res = self.get_query(path, query_params).await?;
            let res = check_response("GET", path, res).await?;

            let file_list: FileList = res.json().await.map_err(error::api)?;

            Ok(file_list)
        }

        pub async fn files_get(&self, file_id: &Id, fields: &str) -> sitepush::Result<File> {
            let path = format!("/files/{file_id}");
            let query_params = &[("fields", fields)];

            let res = self.get_query(&path, query_params).await?;
            let res = check_response("GET", &path, res).await?;

            let file: File = res.json().await.map_err(error::api)?;
            Ok(file)
        }

        pub async fn files_create(&self, file: &File) -> sitepush::Result<File> {
            let path = "/files";
            let query_params = &[("fields", "id")];
            let res = self.post_json_query(path, query_params, file).await?;
            let res = check_response("POST", path, res).await?;

            let file: File = res.json().await.map_err(error::api)?;
            Ok(file)
        }

        /// Resumable upload of `data_len` bytes read from `data`.
        /// `local` is only used in error messages.
        pub async fn files_upload<D>(
            &self,
            file: &File,
            data_len: u64,
            data: D,
            local: &FsPath,
        ) -> sitepush::Result<File>
        where
            D: io::AsyncRead,
        {
            use io::AsyncReadExt;

            let upload_params = UploadParams {
                size: data_len,
                mime_type: file.mime_type.as_deref(),
                fields: "id",
            };
            let upload_url = self.upload_request("/files", &upload_params, file).await?;

            tokio::pin!(data);

            let mut sent = 0u64;
            let file: File = loop {
                let chunk = chunk_len(sent, data_len);
                let mut buf: Vec<u8> = Vec::with_capacity(chunk as _);
                let sz = data
                    .as_mut()
                    .take(chunk)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|err| sitepush::io_error!("Could not read {local}: {err}"))?
                    as u64;
                if sz == 0 && sent < data_len {
                    sitepush::io_bail!("{local} was truncated during upload");
                }
                log::trace!("uploading {sz} bytes");
                let res = self
                    .upload_range(upload_url.clone(), buf, sent, data_len)
                    .await?;
                sent += sz;
                let status = res.status();
                if status.is_success() {
                    break res.json().await.map_err(error::api)?;
                } else if status == StatusCode::PERMANENT_REDIRECT && sent < data_len {
                    // "308 Resume Incomplete"
                    continue;
                } else {
                    check_response("PUT", "/files", res).await?;
                    sitepush::api_bail!("Upload of {local} ended with status {status}");
                }
            };
            Ok(file)
        }

        pub async fn files_delete(&self, file_id: &Id) -> sitepush::Result<()> {
            let path = format!("/files/{file_id}");
            let res = self.delete_query(&path).await?;
            check_response("DELETE", &path, res).await?;
            Ok(())
        }

        pub async fn permissions_list(&self, file_id: &Id) -> sitepush::Result<Vec<Permission>> {
            let path = format!("/files/{file_id}/permissions");
            let mut permissions = Vec::new();
            let mut next_page_token: Option<String> = None;
            loop {
                let mut query_params = vec![(
                    "fields",
                    "nextPageToken,permissions(id,type,role)".to_string(),
                )];
                if let Some(page_token) = next_page_token.take() {
                    query_params.push(("pageToken", page_token));
                }
                let res = self.get_query(&path, query_params).await?;
                let res = check_response("GET", &path, res).await?;
                let list: PermissionList = res.json().await.map_err(error::api)?;
                permissions.extend(list.permissions.unwrap_or_default());
                next_page_token = list.next_page_token;
                if next_page_token.is_none() {
                    break;
                }
            }
            Ok(permissions)
        }

        pub async fn permissions_create(
            &self,
            file_id: &Id,
            permission: &Permission,
        ) -> sitepush::Result<()> {
            let path = format!("/files/{file_id}/permissions");
            let query_params = &[("fields", "id")];
            let res = self
                .post_json_query(&path, query_params, permission)
                .await?;
            check_response("POST", &path, res).await?;
            Ok(())
        }
    }

    /// Reads the upload session URL of a resumable upload request
    pub fn session_url(res: &reqwest::Response) -> sitepush::Result<reqwest::Url> {
        let location = res
            .headers()
            .get(header::LOCATION)
            .ok_or_else(|| sitepush::api_error!("No upload session returned"))?;
        let location = location.to_str().map_err(error::api)?;
        reqwest::Url::parse(location).map_err(error::api)
    }
}

mod utils {
    use std::borrow::Borrow;

    use oauth2::{AccessToken, Scope};
    use reqwest::{header, Response, StatusCode, Url};
    use serde::{Deserialize, Deserializer, Serialize};

    use super::api;
    use crate::{error, oauth2::GetToken};

    pub fn num_from_str<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use std::str::FromStr;

        let s = String::deserialize(deserializer)?;
        Ok(Some(i64::from_str(&s).map_err(serde::de::Error::custom)?))
    }

    pub async fn check_response(
        method: &str,
        path: &str,
        res: Response,
    ) -> sitepush::Result<Response> {
        if !res.status().is_success() {
            sitepush::api_bail!(
                "{method} {path} returned {}\n{}",
                res.status(),
                res.text().await.map_err(error::api)?
            );
        }
        Ok(res)
    }

    impl<A> super::GoogleDrive<A>
    where
        A: GetToken,
    {
        pub async fn fetch_token(&self) -> sitepush::Result<AccessToken> {
            self.auth
                .get_token(vec![Scope::new(api::SCOPE.to_string())])
                .await
        }

        pub async fn get_query<Q, K, V>(&self, path: &str, query_params: Q) -> sitepush::Result<Response>
        where
            Q: IntoIterator,
            Q::Item: Borrow<(K, V)>,
            K: AsRef<str>,
            V: AsRef<str>,
        {
            let token = self.fetch_token().await?;
            let url = url_with_query(self.base_url, path, query_params)?;

            let res = self
                .client
                .get(url)
                .header(header::USER_AGENT, &self.user_agent)
                .bearer_auth(token.secret())
                .send()
                .await
                .map_err(error::api)?;

            Ok(res)
        }

        pub async fn post_json_query<T, Q, K, V>(
            &self,
            path: &str,
            query_params: Q,
            body: &T,
        ) -> sitepush::Result<Response>
        where
            T: Serialize,
            Q: IntoIterator,
            Q::Item: Borrow<(K, V)>,
            K: AsRef<str>,
            V: AsRef<str>,
        {
            let token = self.fetch_token().await?;
            let url = url_with_query(self.base_url, path, query_params)?;
            let res = self
                .client
                .post(url)
                .bearer_auth(token.secret())
                .header(header::USER_AGENT, &self.user_agent)
                .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
                .json(body)
                .send()
                .await
                .map_err(error::api)?;
            Ok(res)
        }

        pub async fn upload_request<B>(
            &self,
            path: &str,
            params: &api::UploadParams<'_>,
            body: &B,
        ) -> sitepush::Result<Url>
        where
            B: Serialize,
        {
            let token = self.fetch_token().await?;

            let url = url_with_query(self.upload_base_url, path, params.query_params())?;
            let mut req = self
                .client
                .post(url.clone())
                .bearer_auth(token.secret())
                .header(header::USER_AGENT, &self.user_agent)
                .header("X-Upload-Content-Length", params.size)
                .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
                .json(body);
            if let Some(mt) = params.mime_type {
                req = req.header("X-Upload-Content-Type", mt);
            }
            let res = req.send().await.map_err(error::api)?;

            if res.status() != StatusCode::OK {
                let res = check_response("POST", url.path(), res).await?;
                sitepush::api_bail!("POST {url} returned {}", res.status());
            }
            api::session_url(&res)
        }

        pub async fn upload_range(
            &self,
            url: Url,
            data: Vec<u8>,
            range_start: u64,
            range_len: u64,
        ) -> sitepush::Result<Response> {
            let token = self.fetch_token().await?;

            let data_len = data.len() as u64;
            debug_assert!(range_len >= range_start + data_len);

            let mut req = self
                .client
                .put(url)
                .bearer_auth(token.secret())
                .header(header::USER_AGENT, &self.user_agent)
                .header(header::CONTENT_LENGTH, data_len);
            if data_len > 0 && (range_start > 0 || data_len < range_len) {
                req = req.header(
                    header::CONTENT_RANGE,
                    format!(
                        "bytes {range_start}-{}/{range_len}",
                        range_start + data_len - 1
                    ),
                );
            }
            req.body(data).send().await.map_err(error::api)
        }

        pub async fn delete_query(&self, path: &str) -> sitepush::Result<Response> {
            let token = self.fetch_token().await?;
            let url = url_with_query(self.base_url, path, Vec::<(&str, &str)>::new())?;
            let res = self
                .client
                .delete(url)
                .bearer_auth(token.secret())
                .header(header::USER_AGENT, &self.user_agent)
                .header(header::CONTENT_LENGTH, 0)
                .send()
                .await
                .map_err(error::api)?;
            Ok(res)
        }
    }

    pub fn url_with_query<B, P, Q, K, V>(base_url: B, path: P, query_params: Q) -> sitepush::Result<Url>
    where
        B: AsRef<str>,
        P: AsRef<str>,
        Q: IntoIterator,
        Q::Item: Borrow<(K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let base = format!("{}{}", base_url.as_ref(), path.as_ref());
        Url::parse_with_params(&base, query_params).map_err(error::bug)
    }
}
