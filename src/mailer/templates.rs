/// Email bodies
use super::OutgoingEmail;

pub const OTP_SUBJECT: &str = "Verify Your Email - OTP for Account Registration";

/// Verification email carrying a signup code
pub fn otp_email(to: &str, code: &str, valid_minutes: i64) -> OutgoingEmail {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Email Verification</title>
</head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f4f4f4;">
  <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff;">
    <div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 40px 30px; text-align: center;">
      <h1 style="color: #ffffff; margin: 0; font-size: 28px;">Email Verification</h1>
      <p style="color: #e8f0fe; margin: 10px 0 0 0;">Complete your account registration</p>
    </div>
    <div style="padding: 40px 30px;">
      <h2 style="color: #333333; margin: 0 0 20px 0;">Welcome to Client Pulse!</h2>
      <p style="color: #666666; line-height: 1.5;">
        Thank you for signing up as {to}. Please verify your email address using the code below.
      </p>
      <div style="background-color: #f8f9fa; border: 2px dashed #667eea; border-radius: 12px; padding: 30px; text-align: center; margin: 30px 0;">
        <p style="color: #333333; margin: 0 0 15px 0; font-weight: 600;">Your Verification Code</p>
        <div style="background-color: #667eea; color: #ffffff; font-size: 32px; font-weight: bold; padding: 15px 25px; border-radius: 8px; display: inline-block; letter-spacing: 4px; font-family: 'Courier New', monospace;">{code}</div>
        <p style="color: #888888; margin: 15px 0 0 0; font-size: 14px;">This code will expire in {valid_minutes} minutes</p>
      </div>
      <p style="color: #856404; font-size: 14px;">
        <strong>Security Notice:</strong> Never share this code with anyone. The Client Pulse team will never ask for your code.
      </p>
      <p style="color: #666666; font-size: 15px;">
        If you didn't request this verification code, please ignore this email.
      </p>
    </div>
  </div>
</body>
</html>"#
    );

    let text = format!(
        r#"Welcome to Client Pulse!

Your email verification code is: {code}

Please enter this code to complete your account registration. This code will expire in {valid_minutes} minutes.

For security reasons, never share this code with anyone.

If you didn't request this code, please ignore this email.
"#
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: OTP_SUBJECT.to_string(),
        html,
        text,
    }
}
