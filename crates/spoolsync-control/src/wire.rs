// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Packet framing: one JSON object per direction, parsed incrementally so
// neither side needs a length prefix or a closed connection to detect a
// complete packet.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::Packet;

/// Upper bound on a single packet; a sync command listing every user on
/// a busy host stays far below this.
const MAX_PACKET_LEN: usize = 64 * 1024;

/// Read one packet, accumulating bytes until they parse as a complete
/// JSON object. EOF mid-object is an error.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet> {
    let mut buf = Vec::with_capacity(256);
    loop {
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(Error::Control("connection closed before any data".into()));
            }
            return serde_json::from_slice(&buf).map_err(Error::from);
        }
        if buf.len() > MAX_PACKET_LEN {
            return Err(Error::Control("control packet too large".into()));
        }
        match serde_json::from_slice::<Packet>(&buf) {
            Ok(packet) => return Ok(packet),
            // Incomplete object so far, keep reading.
            Err(e) if e.is_eof() => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write one packet, newline-terminated for the benefit of `nc -U` style
/// debugging.
pub async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, packet: &Packet) -> Result<()> {
    let mut bytes = serde_json::to_vec(packet)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolsync_core::types::PacketType;

    #[tokio::test]
    async fn round_trips_a_packet() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let sent = Packet { kind: PacketType::Sync, message: "[\"alice\"]".into() };

        write_packet(&mut client, &sent).await.unwrap();
        let received = read_packet(&mut server).await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn reads_packet_split_across_writes() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let reader = tokio::spawn(async move { read_packet(&mut server).await });

        client.write_all(br#"{"type":"clear-"#).await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(br#"cache"}"#).await.unwrap();

        let packet = reader.await.unwrap().unwrap();
        assert_eq!(packet.kind, PacketType::ClearCache);
        assert_eq!(packet.message, "");
    }

    #[tokio::test]
    async fn eof_mid_object_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(br#"{"type":"sync""#).await.unwrap();
        drop(client);
        assert!(read_packet(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn immediate_eof_is_an_error() {
        let (client, mut server) = tokio::io::duplex(1024);
        drop(client);
        let err = read_packet(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"not json at all\n").await.unwrap();
        assert!(read_packet(&mut server).await.is_err());
    }
}
