//! Server-level operations: CAPABILITY, NOOP, ID, QUOTA.

#![allow(clippy::missing_errors_doc)]

use std::collections::BTreeMap;

use tokio::io::{AsyncRead, AsyncWrite};

use super::idle::Notification;
use super::{CommandReply, Connection};
use crate::Result;
use crate::command::Command;
use crate::parser::Value;

/// Usage and limit for one quota resource (RFC 2087).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaResource {
    /// Resource name (`STORAGE`, `MESSAGE`, …).
    pub name: String,
    /// Current usage.
    pub usage: u64,
    /// Resource limit.
    pub limit: u64,
}

/// Quota report for one quota root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Per-resource usage/limit entries.
    pub resources: Vec<QuotaResource>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Asks the server for its capability list and refreshes the cache.
    pub async fn capability(&mut self) -> Result<Vec<String>> {
        self.dispatch(&Command::Capability).await?.expect_ok()?;
        Ok(self.capabilities().to_vec())
    }

    /// Pings the server.
    ///
    /// Untagged updates the server chose to piggyback (EXISTS, EXPUNGE, …)
    /// are returned in order.
    pub async fn noop(&mut self) -> Result<Vec<Notification>> {
        let reply = self.dispatch(&Command::Noop).await?.expect_ok()?;
        Ok(reply
            .untagged
            .into_iter()
            .map(Notification::from_values)
            .collect())
    }

    /// Exchanges client/server identification (RFC 2971).
    ///
    /// `None` sends `ID NIL`. The server's fields come back as a map; an
    /// `ID NIL` answer yields an empty map.
    pub async fn id(
        &mut self,
        params: Option<&[(&str, &str)]>,
    ) -> Result<BTreeMap<String, String>> {
        let cmd = Command::Id {
            params: params.map(|p| {
                p.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect()
            }),
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;

        let mut out = BTreeMap::new();
        for frame in reply.keyword_frames("ID") {
            let Some(fields) = frame.get(2).and_then(Value::as_list) else {
                continue; // ID NIL
            };
            for pair in fields.chunks(2) {
                if let [key, value] = pair
                    && let Some(key) = key.as_str()
                    && let Some(value) = value.as_str()
                {
                    out.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(out)
    }

    /// Queries a quota root directly (RFC 2087).
    pub async fn get_quota(&mut self, root: &str) -> Result<Vec<Quota>> {
        self.require_authenticated()?;
        let cmd = Command::GetQuota {
            root: root.to_string(),
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;
        Ok(quota_frames(&reply))
    }

    /// Queries the quota roots of a mailbox and their quotas (RFC 2087).
    ///
    /// Returns the root names announced for the mailbox and the quota
    /// reports the server attached.
    pub async fn get_quota_root(&mut self, folder: &str) -> Result<(Vec<String>, Vec<Quota>)> {
        self.require_authenticated()?;
        let cmd = Command::GetQuotaRoot {
            mailbox: folder.to_string(),
        };
        let reply = self.dispatch(&cmd).await?.expect_ok()?;

        let mut roots = Vec::new();
        for frame in reply.keyword_frames("QUOTAROOT") {
            // * QUOTAROOT <mailbox> <root…>
            roots.extend(
                frame
                    .get(3..)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_bytes)
                    .map(|b| String::from_utf8_lossy(b).into_owned()),
            );
        }
        Ok((roots, quota_frames(&reply)))
    }
}

/// Parses `* QUOTA <root> (NAME usage limit …)` frames.
fn quota_frames(reply: &CommandReply) -> Vec<Quota> {
    let mut quotas = Vec::new();
    for frame in reply.keyword_frames("QUOTA") {
        let Some(root) = frame
            .get(2)
            .and_then(Value::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned())
        else {
            continue;
        };
        let Some(list) = frame.get(3).and_then(Value::as_list) else {
            continue;
        };

        let mut resources = Vec::new();
        for triple in list.chunks(3) {
            if let [name, usage, limit] = triple
                && let Some(name) = name.as_str()
                && let Some(usage) = usage.as_str().and_then(|s| s.parse().ok())
                && let Some(limit) = limit.as_str().and_then(|s| s.parse().ok())
            {
                resources.push(QuotaResource {
                    name: name.to_ascii_uppercase(),
                    usage,
                    limit,
                });
            }
        }
        quotas.push(Quota { root, resources });
    }
    quotas
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use tokio_test::io::Builder;

    async fn authenticated(
        script: impl FnOnce(&mut Builder) -> &mut Builder,
    ) -> Connection<tokio_test::io::Mock> {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"TAG1 LOGIN joe secret\r\n")
            .read(b"TAG1 OK logged in\r\n");
        script(&mut builder);
        let mut conn = Connection::from_stream(builder.build()).await.unwrap();
        conn.login("joe", "secret").await.unwrap();
        conn
    }

    #[tokio::test]
    async fn capability_refreshes_cache() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 CAPABILITY\r\n")
                .read(b"* CAPABILITY IMAP4rev1 IDLE MOVE QUOTA\r\nTAG2 OK done\r\n")
        })
        .await;

        let caps = conn.capability().await.unwrap();
        assert!(caps.iter().any(|c| c == "MOVE"));
        assert!(conn.has_capability("quota"));
    }

    #[tokio::test]
    async fn noop_surfaces_piggybacked_updates() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 NOOP\r\n")
                .read(b"* 8 EXISTS\r\n* 2 EXPUNGE\r\nTAG2 OK done\r\n")
        })
        .await;

        let updates = conn.noop().await.unwrap();
        assert_eq!(
            updates,
            vec![Notification::Exists(8), Notification::Expunge(2)]
        );
    }

    #[tokio::test]
    async fn id_round_trip() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 ID (name wavecrest)\r\n").read(
                b"* ID (\"name\" \"Dovecot\" \"version\" \"2.3.16\")\r\nTAG2 OK done\r\n",
            )
        })
        .await;

        let info = conn.id(Some(&[("name", "wavecrest")])).await.unwrap();
        assert_eq!(info["name"], "Dovecot");
        assert_eq!(info["version"], "2.3.16");
    }

    #[tokio::test]
    async fn id_nil_answer_is_empty() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 ID NIL\r\n")
                .read(b"* ID NIL\r\nTAG2 OK done\r\n")
        })
        .await;

        let info = conn.id(None).await.unwrap();
        assert!(info.is_empty());
    }

    #[tokio::test]
    async fn get_quota_parses_resources() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 GETQUOTA user.joe\r\n").read(
                b"* QUOTA user.joe (STORAGE 10240 512000 MESSAGE 800 10000)\r\nTAG2 OK done\r\n",
            )
        })
        .await;

        let quotas = conn.get_quota("user.joe").await.unwrap();
        assert_eq!(quotas.len(), 1);
        assert_eq!(quotas[0].root, "user.joe");
        assert_eq!(
            quotas[0].resources[0],
            QuotaResource {
                name: "STORAGE".to_string(),
                usage: 10240,
                limit: 512_000,
            }
        );
        assert_eq!(quotas[0].resources[1].name, "MESSAGE");
    }

    #[tokio::test]
    async fn get_quota_root_returns_roots_and_quotas() {
        let mut conn = authenticated(|b| {
            b.write(b"TAG2 GETQUOTAROOT INBOX\r\n").read(
                b"* QUOTAROOT INBOX \"\"\r\n* QUOTA \"\" (STORAGE 10 512)\r\nTAG2 OK done\r\n",
            )
        })
        .await;

        let (roots, quotas) = conn.get_quota_root("INBOX").await.unwrap();
        assert_eq!(roots, vec![String::new()]);
        assert_eq!(quotas.len(), 1);
        assert_eq!(quotas[0].resources[0].usage, 10);
        assert_eq!(quotas[0].resources[0].limit, 512);
    }
}
