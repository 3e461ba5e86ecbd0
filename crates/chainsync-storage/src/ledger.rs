//! Message-ledger projection shared by every backend.

use chainsync_core::record::{MessageBody, MessageRecord};
use chainsync_core::store::{MessageStatus, StoredMessage};

/// `(module, status, raw bytes, decode error)` for one message.
pub fn ledger_fields(
    body: &MessageBody,
) -> (Option<String>, MessageStatus, Option<Vec<u8>>, Option<String>) {
    match body {
        MessageBody::Decoded { module, .. } => {
            (Some(module.clone()), MessageStatus::Decoded, None, None)
        }
        MessageBody::Unrecognized { raw } => {
            (None, MessageStatus::Unrecognized, Some(raw.clone()), None)
        }
        MessageBody::Unparsed { module, raw, error } => (
            Some(module.clone()),
            MessageStatus::Unparsed,
            Some(raw.clone()),
            Some(error.clone()),
        ),
    }
}

pub fn stored_message(msg: &MessageRecord) -> StoredMessage {
    let (module, status, raw, error) = ledger_fields(&msg.body);
    StoredMessage {
        tx_hash: msg.tx_hash.clone(),
        block_height: msg.block_height,
        msg_index: msg.msg_index,
        type_url: msg.type_url.clone(),
        module,
        status,
        raw,
        error,
    }
}
