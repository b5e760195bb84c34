use serde_json::Value;

use crate::model::{Auth, AuthSetting, Body, HttpRequest, MultipartValue, RawBodyKind};
use crate::variable::resolver::VariableResolver;
use crate::variable::types::VariableSources;

/// 对请求做变量插值，返回新的请求，原请求不变
///
/// 覆盖范围：URL、请求头名称和值、请求体、参数名称和值，以及各认证方式
/// 各自的凭据字段。
pub fn interpolate_request(request: &HttpRequest, sources: &VariableSources) -> HttpRequest {
    interpolate_with(request, &sources.combined())
}

/// 同 [`interpolate_request`]，使用已合并好的变量对象
pub fn interpolate_with(request: &HttpRequest, vars: &Value) -> HttpRequest {
    let sub = |text: &str| VariableResolver::substitute(text, vars);
    let mut out = request.clone();

    out.url = sub(&request.url);

    for header in &mut out.headers {
        header.name = sub(&header.name);
        header.value = sub(&header.value);
    }

    for param in &mut out.params {
        param.name = sub(&param.name);
        param.value = sub(&param.value);
    }

    if let Some(body) = &mut out.body {
        interpolate_body(body, vars);
    }

    if let Some(AuthSetting::Configured(auth)) = &mut out.auth {
        interpolate_auth(auth, vars);
    }

    out
}

fn interpolate_body(body: &mut Body, vars: &Value) {
    let sub = |text: &str| VariableResolver::substitute(text, vars);
    match body {
        Body::Raw { kind, data } => {
            *data = if *kind == RawBodyKind::Json {
                VariableResolver::substitute_json(data, vars)
            } else {
                sub(data)
            };
        }
        Body::FormUrlEncoded(entries) => {
            for entry in entries {
                entry.value = sub(&entry.value);
            }
        }
        Body::Multipart(entries) | Body::Entries(entries) => {
            for entry in entries {
                entry.value = match &entry.value {
                    MultipartValue::One(value) => MultipartValue::One(sub(value)),
                    MultipartValue::Many(values) => {
                        MultipartValue::Many(values.iter().map(|v| sub(v)).collect())
                    }
                };
            }
        }
        Body::File(_) => {}
    }
}

fn interpolate_auth(auth: &mut Auth, vars: &Value) {
    let sub = |field: &mut String| *field = VariableResolver::substitute(field, vars);
    match auth {
        Auth::None => {}
        Auth::Basic(basic) | Auth::Digest(basic) | Auth::Wsse(basic) => {
            sub(&mut basic.username);
            sub(&mut basic.password);
        }
        Auth::Bearer(bearer) => sub(&mut bearer.token),
        Auth::ApiKey(key) => {
            sub(&mut key.key);
            sub(&mut key.value);
        }
        Auth::AwsV4(aws) => {
            sub(&mut aws.access_key_id);
            sub(&mut aws.secret_access_key);
            sub(&mut aws.session_token);
            sub(&mut aws.service);
            sub(&mut aws.region);
            sub(&mut aws.profile_name);
        }
        Auth::Ntlm(ntlm) => {
            sub(&mut ntlm.username);
            sub(&mut ntlm.password);
            sub(&mut ntlm.domain);
        }
    }
}
