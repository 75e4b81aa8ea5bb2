//! Send-Queues der verbundenen Clients
//!
//! Jede aktive Verbindung besitzt eine begrenzte mpsc-Queue. Der
//! Verbindungs-Task liest daraus und schreibt auf den TCP-Stream; alle
//! anderen Stellen (Raum-Broadcasts) senden nur ueber einen [`ClientSender`].
//! Gesendet wird nie blockierend: eine volle Queue verwirft die Nachricht.

use echo_core::ConnectionId;
use echo_protocol::ControlMessage;
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Client
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    tx: mpsc::Sender<ControlMessage>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: ControlMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %self.connection_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }

    /// Gibt `true` zurueck solange der Empfaenger existiert
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Erstellt Sender und Empfaenger fuer eine neue Verbindung
pub fn sende_queue(connection_id: ConnectionId) -> (ClientSender, mpsc::Receiver<ControlMessage>) {
    sende_queue_mit_groesse(connection_id, SEND_QUEUE_GROESSE)
}

pub fn sende_queue_mit_groesse(
    connection_id: ConnectionId,
    groesse: usize,
) -> (ClientSender, mpsc::Receiver<ControlMessage>) {
    let (tx, rx) = mpsc::channel(groesse.max(1));
    (ClientSender { connection_id, tx }, rx)
}
