use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

/// Outbound-mail seam. The server always talks to this trait; which
/// implementation backs it depends on whether SMTP is configured.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn enviar(&self, destinatario: &str, asunto: &str, cuerpo_html: &str) -> Result<()>;
}

/// Real SMTP delivery over lettre's tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    remitente: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, usuario: &str, clave: &str, remitente: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay host '{host}'"))?
            .credentials(Credentials::new(usuario.to_string(), clave.to_string()))
            .build();
        let remitente = remitente
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address '{remitente}'"))?;
        Ok(Self {
            transport,
            remitente,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn enviar(&self, destinatario: &str, asunto: &str, cuerpo_html: &str) -> Result<()> {
        let mensaje = Message::builder()
            .from(self.remitente.clone())
            .to(destinatario
                .parse::<Mailbox>()
                .with_context(|| format!("invalid recipient address '{destinatario}'"))?)
            .subject(asunto)
            .header(ContentType::TEXT_HTML)
            .body(cuerpo_html.to_string())?;
        self.transport
            .send(mensaje)
            .await
            .with_context(|| format!("smtp delivery to '{destinatario}' failed"))?;
        Ok(())
    }
}

/// Logs instead of delivering. Used when no SMTP relay is configured so the
/// notification endpoints stay exercisable in development.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn enviar(&self, destinatario: &str, asunto: &str, cuerpo_html: &str) -> Result<()> {
        info!(
            %destinatario,
            %asunto,
            bytes = cuerpo_html.len(),
            "correo registrado sin enviar (sin transporte SMTP)"
        );
        Ok(())
    }
}

/// Fails every send. Placeholder for contexts that must not mail at all.
pub struct MissingMailer;

#[async_trait]
impl Mailer for MissingMailer {
    async fn enviar(&self, destinatario: &str, _asunto: &str, _cuerpo_html: &str) -> Result<()> {
        Err(anyhow!("mail transport unavailable for '{destinatario}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_any_message() {
        LogMailer
            .enviar("jperez@liceo-a.cl", "Adscripción", "<p>hola</p>")
            .await
            .expect("log mailer never fails");
    }

    #[tokio::test]
    async fn missing_mailer_rejects_every_send() {
        let resultado = MissingMailer
            .enviar("jperez@liceo-a.cl", "Adscripción", "<p>hola</p>")
            .await;
        assert!(resultado.is_err());
    }

    #[test]
    fn smtp_mailer_rejects_malformed_sender() {
        let resultado = SmtpMailer::new("smtp.uni.cl", "cuenta", "clave", "no-es-un-correo");
        assert!(resultado.is_err());
    }
}
