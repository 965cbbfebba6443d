use crate::domain::{Directivo, Establecimiento};

/// Placeholder shown while the operator has not yet picked both a school
/// and a contact.
pub const CARTA_SIN_SELECCION: &str =
    "<p>Seleccione un establecimiento y un directivo para previsualizar la carta.</p>";

/// Default body for the school-facing notification, stored per-audience in
/// the database and editable through the template endpoints. Placeholders
/// use `{{ campo }}` syntax and are substituted at send time.
pub const PLANTILLA_ESTABLECIMIENTO_DEFECTO: &str = r#"<html>
  <body>
    <p>Estimado/a {{ nombre }}:</p>
    <p>
      Junto con saludar, nos dirigimos a usted en
      su calidad de {{ cargo }} del {{ establecimiento }}
      para informarle que el programa Pr&aacute;cticas Conectadas ha asignado
      estudiantes en pr&aacute;ctica a su establecimiento (RBD {{ rbd }}).
    </p>
    <table border="1" cellpadding="4">
      <tr><th>Jornada</th><th>Horario</th></tr>
      <tr><td>Ma&ntilde;ana</td><td>08:00 - 13:00</td></tr>
      <tr><td>Tarde</td><td>14:00 - 18:00</td></tr>
    </table>
    <p>Agradecemos su disposici&oacute;n y quedamos atentos a sus comentarios.</p>
    <p>Atentamente,<br/>Coordinaci&oacute;n de Pr&aacute;cticas</p>
  </body>
</html>
"#;

/// Default body for the student-facing notification.
pub const PLANTILLA_ESTUDIANTE_DEFECTO: &str = r#"<html>
  <body>
    <p>Estimado/a {{ nombres }} {{ apellidos }}:</p>
    <p>
      Le informamos que ha sido adscrito/a al establecimiento
      {{ establecimiento }} para realizar su pr&aacute;ctica profesional.
      Recibir&aacute; las indicaciones de horario y contacto por parte de la
      coordinaci&oacute;n.
    </p>
    <p>Atentamente,<br/>Coordinaci&oacute;n de Pr&aacute;cticas</p>
  </body>
</html>
"#;

/// Preview of the fixed notification letter for a school contact. Pure:
/// equal inputs always produce identical output. Either input missing
/// yields the placeholder.
pub fn carta_establecimiento(
    establecimiento: Option<&Establecimiento>,
    directivo: Option<&Directivo>,
) -> String {
    let (Some(establecimiento), Some(directivo)) = (establecimiento, directivo) else {
        return CARTA_SIN_SELECCION.to_string();
    };

    format!(
        r#"<html>
  <body>
    <p>Estimado/a {nombre}:</p>
    <p>
      Junto con saludar, nos dirigimos a usted en
      su calidad de {cargo} del {escuela}
      para informarle que el programa Pr&aacute;cticas Conectadas ha asignado
      estudiantes en pr&aacute;ctica a su establecimiento (RBD {rbd}).
    </p>
    <table border="1" cellpadding="4">
      <tr><th>Jornada</th><th>Horario</th></tr>
      <tr><td>Ma&ntilde;ana</td><td>08:00 - 13:00</td></tr>
      <tr><td>Tarde</td><td>14:00 - 18:00</td></tr>
    </table>
    <p>Agradecemos su disposici&oacute;n y quedamos atentos a sus comentarios.</p>
    <p>Atentamente,<br/>Coordinaci&oacute;n de Pr&aacute;cticas</p>
  </body>
</html>
"#,
        nombre = directivo.nombre,
        cargo = directivo.cargo,
        escuela = establecimiento.nombre,
        rbd = establecimiento.rbd,
    )
}
