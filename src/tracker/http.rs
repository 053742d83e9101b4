use reqwest::Client;

use crate::bencode::{decode, Value};
use crate::constants::HTTP_TRACKER_TIMEOUT;

use super::error::TrackerError;
use super::response::{parse_compact_peers, AnnounceRequest, AnnounceResponse};

/// An HTTP tracker client: announces are GET requests with URL-encoded
/// query parameters, answered with a bencoded dictionary.
pub struct HttpTracker {
    client: Client,
    url: String,
}

impl HttpTracker {
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }
        let client = Client::builder()
            .timeout(HTTP_TRACKER_TIMEOUT)
            .build()
            .map_err(TrackerError::Http)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn announce(
        &self,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        let mut url = format!(
            "{}?info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&numwant={}&compact=1",
            self.url,
            request.info_hash.url_encode(),
            request.peer_id.url_encode(),
            request.port,
            request.uploaded,
            request.downloaded,
            request.left,
            request.numwant,
        );
        let event = request.event.as_str();
        if !event.is_empty() {
            url.push_str("&event=");
            url.push_str(event);
        }
        if let Some(tracker_id) = &request.tracker_id {
            url.push_str("&trackerid=");
            url.push_str(tracker_id);
        }

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::BadHttpStatus(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_announce_response(&body)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub(super) fn parse_announce_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    if value.as_dict().is_none() {
        return Err(TrackerError::InvalidAnnounceResponse("expected dict"));
    }

    if let Some(reason) = value.get(b"failure reason").and_then(Value::as_str) {
        return Err(TrackerError::Failure(reason.to_string()));
    }

    let interval = value
        .get(b"interval")
        .and_then(Value::as_integer)
        .filter(|&n| n >= 0)
        .ok_or(TrackerError::InvalidAnnounceResponse("missing interval"))?
        as u32;

    let peers = match value.get(b"peers") {
        Some(Value::Bytes(compact)) => parse_compact_peers(compact),
        Some(Value::List(entries)) => entries
            .iter()
            .filter_map(|entry| {
                let ip = entry.get(b"ip")?.as_str()?.parse().ok()?;
                let port = entry.get(b"port")?.as_integer()? as u16;
                Some(std::net::SocketAddr::new(ip, port))
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(AnnounceResponse {
        interval,
        complete: value
            .get(b"complete")
            .and_then(Value::as_integer)
            .map(|n| n as u32),
        incomplete: value
            .get(b"incomplete")
            .and_then(Value::as_integer)
            .map(|n| n as u32),
        peers,
        tracker_id: value
            .get(b"tracker id")
            .and_then(Value::as_str)
            .map(String::from),
        warning_message: value
            .get(b"warning message")
            .and_then(Value::as_str)
            .map(String::from),
    })
}
