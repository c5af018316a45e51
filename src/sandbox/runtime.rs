// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 基于 boa 的脚本执行
//!
//! 每次执行在一个新线程上创建全新的 JS 上下文，调用方在有界通道上等待结果。
//! 原生函数通过线程局部的作用域访问本次执行的能力集合。

use crate::engines::traits::FetchRequest;
use crate::sandbox::capabilities::parse_request_spec;
use crate::sandbox::crypto;
use crate::sandbox::helpers::{clean_html, default_helpers_script};
use crate::sandbox::{Sandbox, ScriptOutcome, ScriptValue};
use crate::utils::errors::ScriptError;
use boa_engine::native_function::{NativeFunction, NativeFunctionPointer};
use boa_engine::{Context, JsNativeError, JsResult, JsString, JsValue, Source as JsSource};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// 注入 `java`、`cookie` 对象的前置脚本
const CAPABILITY_PRELUDE: &str = r#"
function __cap_str(v) {
  if (v === undefined || v === null) return '';
  if (typeof v === 'string') return v;
  if (typeof v === 'object') return JSON.stringify(v);
  return String(v);
}
function __cap_request(url, method, headers, body) {
  var raw = __cap_http(
    __cap_str(url),
    method,
    headers ? (typeof headers === 'string' ? headers : JSON.stringify(headers)) : '',
    __cap_str(body)
  );
  var res = JSON.parse(raw);
  res.body = res.body || '';
  res.toString = function () { return res.body; };
  return res;
}
function __cap_pad(n) { return n < 10 ? '0' + n : '' + n; }
var java = {
  get: function (k) { return __cap_get(__cap_str(k)); },
  put: function (k, v) { __cap_put(__cap_str(k), __cap_str(v)); return v; },
  ajax: function (url) { return __cap_request(url, '', null, null).body; },
  connect: function (url, headers) { return __cap_request(url, '', headers, null); },
  post: function (url, body, headers) { return __cap_request(url, 'POST', headers, body); },
  getCookie: function (url) { return __cap_cookie(__cap_str(url)); },
  base64Encode: function (s) { return __cap_base64Encode(__cap_str(s)); },
  base64Decode: function (s) { return __cap_base64Decode(__cap_str(s)); },
  hexEncode: function (s) { return __cap_hexEncode(__cap_str(s)); },
  hexDecode: function (s) { return __cap_hexDecode(__cap_str(s)); },
  md5Encode: function (s) { return __cap_md5(__cap_str(s)); },
  md5Encode16: function (s) { return __cap_md5_16(__cap_str(s)); },
  aesEncode: function (s, key, iv) { return __cap_aesEncode(__cap_str(s), __cap_str(key), __cap_str(iv)); },
  aesDecode: function (s, key, iv) { return __cap_aesDecode(__cap_str(s), __cap_str(key), __cap_str(iv)); },
  encodeURI: function (s) { return __cap_encodeURI(__cap_str(s)); },
  setContent: function (v) { __cap_setContent(__cap_str(v)); return v; },
  evalPermissive: function (s) { return __cap_evalPermissive(__cap_str(s)); },
  timeFormat: function (ms) {
    var d = new Date(Number(ms));
    return d.getFullYear() + '/' + __cap_pad(d.getMonth() + 1) + '/' + __cap_pad(d.getDate())
      + ' ' + __cap_pad(d.getHours()) + ':' + __cap_pad(d.getMinutes());
  },
  log: function (m) { __cap_log(__cap_str(m)); return m; },
  toast: function () {},
  longToast: function () {}
};
var cookie = { getCookie: function (url) { return java.getCookie(url); } };
"#;

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<Rc<ScriptScope>>> = const { RefCell::new(None) };
}

/// 单次执行期间原生函数可见的状态
struct ScriptScope {
    sandbox: Sandbox,
    replaced_result: RefCell<Option<String>>,
    cancelled: Arc<AtomicBool>,
}

/// 交给脚本线程的任务
pub(crate) struct ScriptJob {
    pub sandbox: Sandbox,
    pub declarations: String,
    pub script: String,
}

/// 在独立线程上执行脚本，超时返回 `ScriptError::Timeout`
///
/// 超时后本次执行被标记为取消：此后任何原生函数调用都抛出异常，
/// 不再读写会话变量或发起请求；纯计算循环由循环次数上限终止
pub(crate) fn execute(job: ScriptJob, timeout: Duration) -> Result<ScriptOutcome, ScriptError> {
    let stack_size = job.sandbox.settings().stack_size_bytes;
    let (tx, rx) = mpsc::sync_channel(1);
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    thread::Builder::new()
        .name("script-sandbox".to_string())
        .stack_size(stack_size)
        .spawn(move || {
            let outcome = run_job(job, flag);
            let _ = tx.send(outcome);
        })
        .map_err(|e| ScriptError::Spawn(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancelled.store(true, Ordering::SeqCst);
            Err(ScriptError::Timeout(timeout))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ScriptError::Aborted),
    }
}

fn run_job(job: ScriptJob, cancelled: Arc<AtomicBool>) -> Result<ScriptOutcome, ScriptError> {
    let mut context = Context::default();
    {
        let settings = job.sandbox.settings();
        let limits = context.runtime_limits_mut();
        limits.set_loop_iteration_limit(settings.loop_iteration_limit);
        limits.set_recursion_limit(settings.recursion_limit);
    }
    register_natives(&mut context)?;

    let scope = Rc::new(ScriptScope {
        sandbox: job.sandbox.clone(),
        replaced_result: RefCell::new(None),
        cancelled,
    });
    ACTIVE_SCOPE.with(|slot| *slot.borrow_mut() = Some(scope.clone()));

    let outcome = evaluate(&mut context, &job).map(|value| ScriptOutcome {
        value,
        replaced_result: scope.replaced_result.borrow_mut().take(),
    });

    ACTIVE_SCOPE.with(|slot| slot.borrow_mut().take());
    outcome
}

fn evaluate(context: &mut Context, job: &ScriptJob) -> Result<ScriptValue, ScriptError> {
    eval_source(context, CAPABILITY_PRELUDE)?;
    eval_source(context, &job.declarations)?;

    if let Some(library) = job.sandbox.library() {
        if let Err(e) = eval_source(context, library) {
            warn!(error = %e, "Script library failed to load, continuing without it");
        }
    }
    eval_source(context, &default_helpers_script())?;

    let value = context
        .eval(JsSource::from_bytes(job.script.as_bytes()))
        .map_err(|e| ScriptError::Execution(e.to_string()))?;
    Ok(convert_value(&value, context))
}

fn eval_source(context: &mut Context, code: &str) -> Result<JsValue, ScriptError> {
    context
        .eval(JsSource::from_bytes(code.as_bytes()))
        .map_err(|e| ScriptError::Execution(e.to_string()))
}

fn convert_value(value: &JsValue, context: &mut Context) -> ScriptValue {
    if value.is_undefined() || value.is_null() {
        return ScriptValue::Empty;
    }
    if let Some(text) = value.as_string() {
        return ScriptValue::Text(text.to_std_string_escaped());
    }
    if value.is_object() && !value.is_callable() {
        if let Ok(json) = value.to_json(context) {
            return ScriptValue::Json(json);
        }
    }
    match value.to_string(context) {
        Ok(text) => ScriptValue::Text(text.to_std_string_escaped()),
        Err(_) => ScriptValue::Empty,
    }
}

fn register_natives(context: &mut Context) -> Result<(), ScriptError> {
    let natives: [(&str, usize, NativeFunctionPointer); 16] = [
        ("__cap_get", 1, native_get),
        ("__cap_put", 2, native_put),
        ("__cap_http", 4, native_http),
        ("__cap_cookie", 1, native_cookie),
        ("__cap_base64Encode", 1, native_base64_encode),
        ("__cap_base64Decode", 1, native_base64_decode),
        ("__cap_hexEncode", 1, native_hex_encode),
        ("__cap_hexDecode", 1, native_hex_decode),
        ("__cap_md5", 1, native_md5),
        ("__cap_md5_16", 1, native_md5_16),
        ("__cap_aesEncode", 3, native_aes_encode),
        ("__cap_aesDecode", 3, native_aes_decode),
        ("__cap_encodeURI", 1, native_encode_uri),
        ("__cap_setContent", 1, native_set_content),
        ("__cap_evalPermissive", 1, native_eval_permissive),
        ("__cap_cleanHtml", 1, native_clean_html),
    ];

    for (name, length, function) in natives {
        context
            .register_global_builtin_callable(
                JsString::from(name),
                length,
                NativeFunction::from_fn_ptr(function),
            )
            .map_err(|e| ScriptError::Execution(e.to_string()))?;
    }
    context
        .register_global_builtin_callable(
            JsString::from("__cap_log"),
            1,
            NativeFunction::from_fn_ptr(native_log),
        )
        .map_err(|e| ScriptError::Execution(e.to_string()))?;
    Ok(())
}

/// 当前执行的作用域，执行已超时取消时返回错误
fn active_scope() -> JsResult<Rc<ScriptScope>> {
    let scope = ACTIVE_SCOPE
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| {
            JsNativeError::typ().with_message("script capabilities are not available")
        })?;
    if scope.cancelled.load(Ordering::SeqCst) {
        return Err(JsNativeError::error()
            .with_message("script cancelled after timeout")
            .into());
    }
    Ok(scope)
}

fn ensure_active() -> JsResult<()> {
    active_scope().map(|_| ())
}

fn arg_string(args: &[JsValue], index: usize, context: &mut Context) -> JsResult<String> {
    match args.get(index) {
        None => Ok(String::new()),
        Some(v) if v.is_undefined() || v.is_null() => Ok(String::new()),
        Some(v) => Ok(v.to_string(context)?.to_std_string_escaped()),
    }
}

fn text(value: &str) -> JsValue {
    JsValue::from(JsString::from(value))
}

fn native_get(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let key = arg_string(args, 0, context)?;
    let scope = active_scope()?;
    Ok(text(&scope.sandbox.capabilities().get_variable(&key)))
}

fn native_put(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let key = arg_string(args, 0, context)?;
    let value = arg_string(args, 1, context)?;
    let scope = active_scope()?;
    scope.sandbox.capabilities().put_variable(&key, &value);
    Ok(text(&value))
}

fn native_http(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let url = arg_string(args, 0, context)?;
    let method = arg_string(args, 1, context)?;
    let headers = arg_string(args, 2, context)?;
    let body = arg_string(args, 3, context)?;
    let scope = active_scope()?;

    let mut request: FetchRequest = parse_request_spec(&url);
    if !method.is_empty() {
        request.method = method.to_ascii_uppercase();
    }
    if !headers.is_empty() {
        match serde_json::from_str::<HashMap<String, serde_json::Value>>(&headers) {
            Ok(map) => {
                for (name, value) in map {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    request.headers.insert(name, value);
                }
            }
            Err(e) => debug!(error = %e, "Ignoring malformed script request headers"),
        }
    }
    if !body.is_empty() {
        request.body = Some(body);
    }

    let response = scope.sandbox.capabilities().fetch(request);
    let json = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());
    Ok(text(&json))
}

fn native_cookie(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let url = arg_string(args, 0, context)?;
    let scope = active_scope()?;
    Ok(text(&scope.sandbox.capabilities().cookie(&url)))
}

fn native_base64_encode(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    Ok(text(&crypto::base64_encode(&arg_string(args, 0, context)?)))
}

fn native_base64_decode(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    let input = arg_string(args, 0, context)?;
    Ok(text(&soft(crypto::base64_decode(&input), "base64Decode")))
}

fn native_hex_encode(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    Ok(text(&crypto::hex_encode(&arg_string(args, 0, context)?)))
}

fn native_hex_decode(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    let input = arg_string(args, 0, context)?;
    Ok(text(&soft(crypto::hex_decode(&input), "hexDecode")))
}

fn native_md5(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    Ok(text(&crypto::md5_hex(&arg_string(args, 0, context)?)))
}

fn native_md5_16(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    Ok(text(&crypto::md5_hex16(&arg_string(args, 0, context)?)))
}

fn native_aes_encode(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    let data = arg_string(args, 0, context)?;
    let key = arg_string(args, 1, context)?;
    let iv = arg_string(args, 2, context)?;
    Ok(text(&soft(crypto::aes_encode_base64(&data, &key, &iv), "aesEncode")))
}

fn native_aes_decode(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    let data = arg_string(args, 0, context)?;
    let key = arg_string(args, 1, context)?;
    let iv = arg_string(args, 2, context)?;
    Ok(text(&soft(crypto::aes_decode_base64(&data, &key, &iv), "aesDecode")))
}

fn native_encode_uri(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    let input = arg_string(args, 0, context)?;
    Ok(text(&urlencoding::encode(&input)))
}

fn native_set_content(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let content = arg_string(args, 0, context)?;
    let scope = active_scope()?;
    *scope.replaced_result.borrow_mut() = Some(content);
    Ok(JsValue::undefined())
}

fn native_eval_permissive(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let payload = arg_string(args, 0, context)?;
    let scope = active_scope()?;
    Ok(text(&scope.sandbox.permissive_eval(&payload)))
}

fn native_clean_html(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    Ok(text(&clean_html(&arg_string(args, 0, context)?)))
}

fn native_log(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    ensure_active()?;
    let message = arg_string(args, 0, context)?;
    debug!(message = %message, "Script log");
    Ok(JsValue::undefined())
}

fn soft<E: std::fmt::Display>(result: Result<String, E>, operation: &str) -> String {
    result.unwrap_or_else(|e| {
        debug!(operation = operation, error = %e, "Script helper failed");
        String::new()
    })
}
